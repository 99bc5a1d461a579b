//! SQL schema for the Matric SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! the `PRAGMA user_version` number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Cleaned layer ───────────────────────────────────────────────────────
-- Written by the upstream cleaning stage (and test fixtures); the sync
-- pipeline only reads these tables.

CREATE TABLE IF NOT EXISTS colleges (
    college_id            TEXT PRIMARY KEY,
    name                  TEXT NOT NULL,
    province              TEXT NOT NULL,
    city                  TEXT,
    is_985                INTEGER NOT NULL DEFAULT 0,
    is_211                INTEGER NOT NULL DEFAULT 0,
    is_double_first_class INTEGER NOT NULL DEFAULT 0,
    updated_at            TEXT NOT NULL     -- ISO 8601 UTC
);

CREATE TABLE IF NOT EXISTS majors (
    major_id   TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    category   TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS admission_scores (
    score_id   TEXT PRIMARY KEY,
    college_id TEXT NOT NULL,
    major_id   TEXT,
    province   TEXT NOT NULL,
    year       INTEGER NOT NULL,
    batch      TEXT,
    min_score  REAL,
    avg_score  REAL,
    min_rank   INTEGER,
    plan_count INTEGER,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollment_plans (
    plan_id    TEXT PRIMARY KEY,
    college_id TEXT NOT NULL,
    major_id   TEXT,
    province   TEXT NOT NULL,
    year       INTEGER NOT NULL,
    plan_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS campus_life (
    life_id           TEXT PRIMARY KEY,
    college_id        TEXT NOT NULL,
    survey_year       INTEGER,
    dorm_score        REAL,
    food_score        REAL,
    environment_score REAL,
    facility_score    REAL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS scores_college_idx   ON admission_scores(college_id);
CREATE INDEX IF NOT EXISTS scores_updated_idx   ON admission_scores(updated_at);
CREATE INDEX IF NOT EXISTS plans_college_idx    ON enrollment_plans(college_id);
CREATE INDEX IF NOT EXISTS life_college_idx     ON campus_life(college_id);
CREATE INDEX IF NOT EXISTS colleges_updated_idx ON colleges(updated_at);
CREATE INDEX IF NOT EXISTS life_updated_idx     ON campus_life(updated_at);

-- ── Core layer ──────────────────────────────────────────────────────────
-- Denormalized, read-optimized. Written only through the upsert contract;
-- data_version starts at 1 and increments by exactly 1 per write.

CREATE TABLE IF NOT EXISTS core_colleges (
    college_id                TEXT PRIMARY KEY,
    name                      TEXT NOT NULL,
    province                  TEXT NOT NULL,
    city                      TEXT,
    is_985                    INTEGER NOT NULL,
    is_211                    INTEGER NOT NULL,
    is_double_first_class     INTEGER NOT NULL,
    major_count               INTEGER NOT NULL,
    enrollment_province_count INTEGER NOT NULL,
    avg_score_recent3         REAL,
    min_rank_recent3          INTEGER,
    latest_year_min_score     REAL,
    latest_year_min_rank      INTEGER,
    hot_level                 INTEGER NOT NULL,
    difficulty                TEXT NOT NULL,   -- 'very_hard' | 'hard' | 'medium' | 'easy'
    score_volatility          REAL,
    overall_life_score        REAL,
    data_version              INTEGER NOT NULL,
    last_synced_at            TEXT NOT NULL,
    sync_source               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS core_admission_scores (
    score_id         TEXT PRIMARY KEY,
    college_id       TEXT,
    major_id         TEXT,
    province         TEXT NOT NULL,
    year             INTEGER NOT NULL,
    batch            TEXT,
    min_score        REAL,
    avg_score        REAL,
    min_rank         INTEGER,
    plan_count       INTEGER,
    college_name     TEXT,
    college_province TEXT,
    college_is_985   INTEGER,
    major_name       TEXT,
    major_category   TEXT,
    competitiveness  INTEGER NOT NULL,
    data_version     INTEGER NOT NULL,
    last_synced_at   TEXT NOT NULL,
    sync_source      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS core_campus_life (
    life_id            TEXT PRIMARY KEY,
    college_id         TEXT,
    survey_year        INTEGER,
    dorm_score         REAL,
    food_score         REAL,
    environment_score  REAL,
    facility_score     REAL,
    college_name       TEXT,
    overall_life_score REAL,
    data_version       INTEGER NOT NULL,
    last_synced_at     TEXT NOT NULL,
    sync_source        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS core_scores_college_idx ON core_admission_scores(college_id);

-- ── Audit log ───────────────────────────────────────────────────────────
-- Append-only; a run row is updated exactly once, at finalization.

CREATE TABLE IF NOT EXISTS sync_runs (
    run_id       TEXT PRIMARY KEY,
    sync_type    TEXT NOT NULL,   -- 'full' | 'incremental'
    entity       TEXT NOT NULL,
    source_layer TEXT NOT NULL,
    target_layer TEXT NOT NULL,
    total        INTEGER NOT NULL,
    synced       INTEGER NOT NULL,
    failed       INTEGER NOT NULL,
    skipped      INTEGER NOT NULL,
    started_at   TEXT NOT NULL,
    finished_at  TEXT,
    status       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS runs_entity_idx  ON sync_runs(entity);
CREATE INDEX IF NOT EXISTS runs_started_idx ON sync_runs(started_at);

PRAGMA user_version = 1;
";
