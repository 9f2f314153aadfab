//! SQL schema for the registry store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    subject_id    TEXT PRIMARY KEY,
    identifier    TEXT NOT NULL UNIQUE COLLATE NOCASE,
    password_hash TEXT NOT NULL,     -- argon2 PHC string
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    subject_id          TEXT PRIMARY KEY REFERENCES accounts(subject_id),
    legal_name          TEXT NOT NULL,
    date_of_birth       TEXT NOT NULL,   -- YYYY-MM-DD
    registration_date   TEXT NOT NULL,   -- YYYY-MM-DD
    registration_status TEXT NOT NULL,   -- 'verified' | 'pending' | 'suspended'
    handle              TEXT NOT NULL UNIQUE COLLATE NOCASE,
    avatar_ref          TEXT
);

-- Only a SHA-256 digest of the bearer token is kept.
CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,
    subject_id   TEXT NOT NULL REFERENCES accounts(subject_id),
    created_at   TEXT NOT NULL,
    expires_at   TEXT NOT NULL,
    revoked_at   TEXT
);

-- Declarations are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS declarations (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    declaration_id TEXT NOT NULL UNIQUE,
    subject_id     TEXT NOT NULL REFERENCES accounts(subject_id),
    status         INTEGER NOT NULL,   -- 0 | 1
    annotation     TEXT NOT NULL,
    created_at     TEXT NOT NULL       -- RFC 3339 UTC, fixed width; server-assigned
);

CREATE INDEX IF NOT EXISTS declarations_subject_idx
    ON declarations(subject_id, created_at, seq);
CREATE INDEX IF NOT EXISTS sessions_subject_idx ON sessions(subject_id);

PRAGMA user_version = 1;
";
