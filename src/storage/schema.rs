//! Database schema definitions.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Measurements table
CREATE TABLE IF NOT EXISTS measurements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    status TEXT NOT NULL,
    modality TEXT NOT NULL,
    file_format_version INTEGER NOT NULL,
    distance REAL NOT NULL DEFAULT 0.0,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_measurements_status ON measurements(status);

-- Event log table
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    measurement_id INTEGER NOT NULL REFERENCES measurements(id) ON DELETE CASCADE,
    type TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    value TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_measurement ON events(measurement_id, timestamp);

-- GNSS locations table
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    measurement_id INTEGER NOT NULL REFERENCES measurements(id) ON DELETE CASCADE,
    timestamp INTEGER NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    altitude REAL,
    speed REAL NOT NULL,
    accuracy REAL,
    vertical_accuracy REAL
);

CREATE INDEX IF NOT EXISTS idx_locations_measurement ON locations(measurement_id, timestamp);

-- Barometer samples table
CREATE TABLE IF NOT EXISTS pressures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    measurement_id INTEGER NOT NULL REFERENCES measurements(id) ON DELETE CASCADE,
    timestamp INTEGER NOT NULL,
    pressure REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pressures_measurement ON pressures(measurement_id, timestamp);

-- Device identifier (single row)
CREATE TABLE IF NOT EXISTS identifiers (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    device_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;
