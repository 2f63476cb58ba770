//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS customers (
    customer_id TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    name_json   TEXT NOT NULL,    -- JSON-encoded CustomerName
    created_at  TEXT NOT NULL     -- ISO 8601 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS contracts (
    contract_id           TEXT PRIMARY KEY,
    tenant_id             TEXT NOT NULL,
    contract_number       TEXT NOT NULL,
    customer_id           TEXT NOT NULL REFERENCES customers(customer_id),
    periodic_amount_cents INTEGER NOT NULL,
    currency              TEXT NOT NULL,
    balance_due_cents     INTEGER NOT NULL,
    status                TEXT NOT NULL,   -- ContractStatus, snake_case
    last_payment_date     TEXT,            -- ISO 8601 date; allocator bookkeeping
    created_at            TEXT NOT NULL
);

-- Payments are never deleted; linking state changes only through the
-- conditional commit operations.
CREATE TABLE IF NOT EXISTS payments (
    payment_id         TEXT PRIMARY KEY,
    tenant_id          TEXT NOT NULL,
    payment_number     TEXT NOT NULL,
    amount_cents       INTEGER NOT NULL,
    currency           TEXT NOT NULL,
    payment_date       TEXT NOT NULL,      -- ISO 8601 date
    agreement_number   TEXT,
    reference_number   TEXT,
    contract_id        TEXT REFERENCES contracts(contract_id),
    customer_id        TEXT REFERENCES customers(customer_id),
    processing_status  TEXT NOT NULL DEFAULT 'pending',
    allocation_status  TEXT NOT NULL DEFAULT 'unallocated',
    linking_confidence REAL,
    processing_notes   TEXT,
    created_at         TEXT NOT NULL
);

-- Linking attempts are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS linking_attempts (
    attempt_id      TEXT PRIMARY KEY,
    payment_id      TEXT NOT NULL REFERENCES payments(payment_id),
    contract_id     TEXT,                  -- NULL for unlink decisions
    confidence      REAL NOT NULL,
    method          TEXT NOT NULL,         -- 'manual' | 'automatic'
    candidates      TEXT NOT NULL,         -- JSON array of CandidateSnapshot
    weights_version TEXT NOT NULL,
    notes           TEXT,
    recorded_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS payments_tenant_idx     ON payments(tenant_id);
CREATE INDEX IF NOT EXISTS payments_processing_idx ON payments(processing_status);
CREATE INDEX IF NOT EXISTS payments_allocation_idx ON payments(allocation_status);
CREATE INDEX IF NOT EXISTS contracts_tenant_idx    ON contracts(tenant_id, status);
CREATE INDEX IF NOT EXISTS attempts_payment_idx    ON linking_attempts(payment_id);

PRAGMA user_version = 1;
";
