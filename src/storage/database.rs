//! Database operations using rusqlite.
//!
//! SQLite implementation of [`MeasurementStore`]: measurements, their event
//! log, GNSS locations, barometer samples and the device identifier.

use crate::measurement::types::{
    Event, EventId, EventType, GeoLocation, Measurement, MeasurementId, MeasurementStatus,
    Modality, Pressure,
};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::storage::sensor_files::SensorFileStore;
use crate::storage::store::{LocationQualityFilter, MeasurementStore};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

const MEASUREMENT_COLUMNS: &str = "id, status, modality, file_format_version, distance, timestamp";
const EVENT_COLUMNS: &str = "id, measurement_id, type, timestamp, value";
const LOCATION_COLUMNS: &str =
    "measurement_id, timestamp, latitude, longitude, altitude, speed, accuracy, vertical_accuracy";

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
    sensor_files: Option<SensorFileStore>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self {
            conn,
            sensor_files: None,
        };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self {
            conn,
            sensor_files: None,
        };
        db.initialize()?;

        Ok(db)
    }

    /// Attach the directory holding raw sensor files.
    pub fn with_sensor_files(mut self, sensor_files: SensorFileStore) -> Self {
        self.sensor_files = Some(sensor_files);
        self
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        // Create schema version table
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        // Check current version
        let current_version = self.get_schema_version()?;

        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result: SqliteResult<i32> = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    /// Count the locations stored for a measurement.
    pub fn count_locations(&self, measurement_id: MeasurementId) -> Result<usize, DatabaseError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM locations WHERE measurement_id = ?1",
                params![measurement_id],
                |row| row.get(0),
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(count as usize)
    }

    fn query_measurements(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Measurement>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params, MeasurementRow::from_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut measurements = Vec::new();
        for row in rows {
            let row = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            measurements.push(row.into_measurement()?);
        }

        Ok(measurements)
    }

    fn query_locations(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<GeoLocation>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params, |row| {
                Ok(GeoLocation {
                    measurement_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                    altitude: row.get(4)?,
                    speed: row.get(5)?,
                    accuracy: row.get(6)?,
                    vertical_accuracy: row.get(7)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    fn update_single(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<usize, DatabaseError> {
        self.conn
            .execute(sql, params)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }
}

impl MeasurementStore for Database {
    fn create_measurement(
        &mut self,
        status: MeasurementStatus,
        modality: Modality,
        file_format_version: u16,
        timestamp: i64,
    ) -> Result<Measurement, DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO measurements (status, modality, file_format_version, distance, timestamp)
                 VALUES (?1, ?2, ?3, 0.0, ?4)",
                params![status.as_str(), modality.as_str(), file_format_version, timestamp],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(Measurement {
            id: self.conn.last_insert_rowid(),
            status,
            modality,
            file_format_version,
            distance: 0.0,
            timestamp,
        })
    }

    fn load_measurement(&self, id: MeasurementId) -> Result<Option<Measurement>, DatabaseError> {
        let sql = format!("SELECT {} FROM measurements WHERE id = ?1", MEASUREMENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], MeasurementRow::from_row)
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        row.map(MeasurementRow::into_measurement).transpose()
    }

    fn load_measurements(&self) -> Result<Vec<Measurement>, DatabaseError> {
        let sql = format!("SELECT {} FROM measurements ORDER BY id ASC", MEASUREMENT_COLUMNS);
        self.query_measurements(&sql, &[])
    }

    fn query_measurements_by_status(
        &self,
        status: MeasurementStatus,
    ) -> Result<Vec<Measurement>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM measurements WHERE status = ?1 ORDER BY id ASC",
            MEASUREMENT_COLUMNS
        );
        self.query_measurements(&sql, &[&status.as_str()])
    }

    fn update_measurement_status(
        &self,
        id: MeasurementId,
        status: MeasurementStatus,
    ) -> Result<usize, DatabaseError> {
        self.update_single(
            "UPDATE measurements SET status = ?2 WHERE id = ?1",
            &[&id, &status.as_str()],
        )
    }

    fn update_measurement_modality(
        &self,
        id: MeasurementId,
        modality: Modality,
    ) -> Result<usize, DatabaseError> {
        self.update_single(
            "UPDATE measurements SET modality = ?2 WHERE id = ?1",
            &[&id, &modality.as_str()],
        )
    }

    fn update_measurement_distance(
        &self,
        id: MeasurementId,
        distance: f64,
    ) -> Result<usize, DatabaseError> {
        self.update_single(
            "UPDATE measurements SET distance = ?2 WHERE id = ?1",
            &[&id, &distance],
        )
    }

    fn append_event(
        &self,
        measurement_id: MeasurementId,
        event_type: EventType,
        timestamp: i64,
        value: Option<&str>,
    ) -> Result<EventId, DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO events (measurement_id, type, timestamp, value) VALUES (?1, ?2, ?3, ?4)",
                params![measurement_id, event_type.as_str(), timestamp, value],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    DatabaseError::ConstraintViolation(format!(
                        "Event for unknown measurement {}",
                        measurement_id
                    ))
                }
                e => DatabaseError::QueryFailed(e.to_string()),
            })?;

        Ok(self.conn.last_insert_rowid())
    }

    fn load_event(&self, id: EventId) -> Result<Option<Event>, DatabaseError> {
        let sql = format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], EventRow::from_row)
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        row.map(EventRow::into_event).transpose()
    }

    fn query_events_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
        type_filter: Option<EventType>,
    ) -> Result<Vec<Event>, DatabaseError> {
        let sql = match type_filter {
            Some(_) => format!(
                "SELECT {} FROM events WHERE measurement_id = ?1 AND type = ?2
                 ORDER BY timestamp ASC, id ASC",
                EVENT_COLUMNS
            ),
            None => format!(
                "SELECT {} FROM events WHERE measurement_id = ?1 ORDER BY timestamp ASC, id ASC",
                EVENT_COLUMNS
            ),
        };

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = match type_filter {
            Some(event_type) => stmt
                .query_map(params![measurement_id, event_type.as_str()], EventRow::from_row)
                .and_then(|rows| rows.collect::<SqliteResult<Vec<_>>>()),
            None => stmt
                .query_map(params![measurement_id], EventRow::from_row)
                .and_then(|rows| rows.collect::<SqliteResult<Vec<_>>>()),
        }
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    fn insert_location(&self, location: &GeoLocation) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO locations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    LOCATION_COLUMNS
                ),
                params![
                    location.measurement_id,
                    location.timestamp,
                    location.latitude,
                    location.longitude,
                    location.altitude,
                    location.speed,
                    location.accuracy,
                    location.vertical_accuracy,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn insert_locations(&mut self, locations: &[GeoLocation]) -> Result<(), DatabaseError> {
        if locations.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO locations ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    LOCATION_COLUMNS
                ))
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for location in locations {
                stmt.execute(params![
                    location.measurement_id,
                    location.timestamp,
                    location.latitude,
                    location.longitude,
                    location.altitude,
                    location.speed,
                    location.accuracy,
                    location.vertical_accuracy,
                ])
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    fn query_locations_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
    ) -> Result<Vec<GeoLocation>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM locations WHERE measurement_id = ?1 ORDER BY timestamp ASC, id ASC",
            LOCATION_COLUMNS
        );
        self.query_locations(&sql, &[&measurement_id])
    }

    fn query_clean_locations(
        &self,
        measurement_id: MeasurementId,
        filter: &LocationQualityFilter,
    ) -> Result<Vec<GeoLocation>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM locations WHERE measurement_id = ?1
             AND accuracy IS NOT NULL AND accuracy <= ?2
             AND speed >= ?3 AND speed <= ?4
             ORDER BY timestamp ASC, id ASC",
            LOCATION_COLUMNS
        );
        self.query_locations(
            &sql,
            &[
                &measurement_id,
                &filter.max_accuracy_m,
                &filter.min_speed_mps,
                &filter.max_speed_mps,
            ],
        )
    }

    fn insert_pressure(&self, pressure: &Pressure) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO pressures (measurement_id, timestamp, pressure) VALUES (?1, ?2, ?3)",
                params![pressure.measurement_id, pressure.timestamp, pressure.pressure],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    fn insert_pressures(&mut self, pressures: &[Pressure]) -> Result<(), DatabaseError> {
        if pressures.is_empty() {
            return Ok(());
        }

        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO pressures (measurement_id, timestamp, pressure) VALUES (?1, ?2, ?3)",
                )
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

            for pressure in pressures {
                stmt.execute(params![
                    pressure.measurement_id,
                    pressure.timestamp,
                    pressure.pressure
                ])
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    fn query_pressures_ordered_by_timestamp(
        &self,
        measurement_id: MeasurementId,
    ) -> Result<Vec<Pressure>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT measurement_id, timestamp, pressure FROM pressures
                 WHERE measurement_id = ?1 ORDER BY timestamp ASC, id ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map(params![measurement_id], |row| {
                Ok(Pressure {
                    measurement_id: row.get(0)?,
                    timestamp: row.get(1)?,
                    pressure: row.get(2)?,
                })
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        rows.collect::<SqliteResult<Vec<_>>>()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
    }

    fn delete_raw_sensor_files(&self, measurement_id: MeasurementId) -> Result<(), DatabaseError> {
        match &self.sensor_files {
            Some(files) => {
                files
                    .delete(measurement_id)
                    .map_err(|e| DatabaseError::IoError(e.to_string()))?;
            }
            None => {
                tracing::debug!(
                    "No sensor file directory configured, nothing to delete for {}",
                    measurement_id
                );
            }
        }
        Ok(())
    }

    fn delete_measurement_cascade(
        &mut self,
        measurement_id: MeasurementId,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        for sql in [
            "DELETE FROM events WHERE measurement_id = ?1",
            "DELETE FROM locations WHERE measurement_id = ?1",
            "DELETE FROM pressures WHERE measurement_id = ?1",
        ] {
            tx.execute(sql, params![measurement_id])
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        }

        let rows_affected = tx
            .execute(
                "DELETE FROM measurements WHERE id = ?1",
                params![measurement_id],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if rows_affected == 0 {
            // Dropping the transaction rolls it back
            return Err(DatabaseError::NotFound(format!(
                "Measurement {}",
                measurement_id
            )));
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        self.delete_raw_sensor_files(measurement_id)
    }

    fn restore_or_create_device_id(&mut self) -> Result<String, DatabaseError> {
        let existing: Option<String> = self
            .conn
            .query_row("SELECT device_id FROM identifiers WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(device_id) = existing {
            return Ok(device_id);
        }

        let device_id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                "INSERT INTO identifiers (id, device_id, created_at) VALUES (1, ?1, ?2)",
                params![device_id, Utc::now().to_rfc3339()],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        tracing::info!("Created device identifier {}", device_id);
        Ok(device_id)
    }

    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        E: From<DatabaseError>,
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        // A savepoint nests inside an enclosing transaction, unlike BEGIN
        self.conn
            .execute_batch("SAVEPOINT atomically")
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        match f(self) {
            Ok(value) => {
                self.conn
                    .execute_batch("RELEASE atomically")
                    .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(e) = self
                    .conn
                    .execute_batch("ROLLBACK TO atomically; RELEASE atomically")
                {
                    tracing::error!("Failed to roll back unit of work: {}", e);
                }
                Err(err)
            }
        }
    }
}

/// Intermediate struct for reading measurement rows from database.
struct MeasurementRow {
    id: MeasurementId,
    status: String,
    modality: String,
    file_format_version: u16,
    distance: f64,
    timestamp: i64,
}

impl MeasurementRow {
    fn from_row(row: &rusqlite::Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            status: row.get(1)?,
            modality: row.get(2)?,
            file_format_version: row.get(3)?,
            distance: row.get(4)?,
            timestamp: row.get(5)?,
        })
    }

    fn into_measurement(self) -> Result<Measurement, DatabaseError> {
        let status = self
            .status
            .parse::<MeasurementStatus>()
            .map_err(DatabaseError::DeserializationError)?;
        let modality = self
            .modality
            .parse::<Modality>()
            .map_err(DatabaseError::DeserializationError)?;

        Ok(Measurement {
            id: self.id,
            status,
            modality,
            file_format_version: self.file_format_version,
            distance: self.distance,
            timestamp: self.timestamp,
        })
    }
}

/// Intermediate struct for reading event rows from database.
struct EventRow {
    id: EventId,
    measurement_id: MeasurementId,
    event_type: String,
    timestamp: i64,
    value: Option<String>,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row) -> SqliteResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            measurement_id: row.get(1)?,
            event_type: row.get(2)?,
            timestamp: row.get(3)?,
            value: row.get(4)?,
        })
    }

    fn into_event(self) -> Result<Event, DatabaseError> {
        let event_type = self
            .event_type
            .parse::<EventType>()
            .map_err(DatabaseError::DeserializationError)?;

        Ok(Event {
            id: self.id,
            event_type,
            timestamp: self.timestamp,
            value: self.value,
            measurement_id: self.measurement_id,
        })
    }
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}
