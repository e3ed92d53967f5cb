//! Vehicle catalog storage.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct VehicleStore {
    pool: SqlitePool,
}

/// A vehicle in the rental catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub uuid: String,
    pub make: String,
    pub model: String,
    pub year: i64,
    pub vehicle_type: String,
    pub price_per_day: f64,
    pub is_available: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a vehicle about to be inserted.
#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub make: String,
    pub model: String,
    pub year: i64,
    pub vehicle_type: String,
    pub price_per_day: f64,
    pub is_available: bool,
}

/// Partial update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct VehicleUpdate {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub vehicle_type: Option<String>,
    pub price_per_day: Option<f64>,
    pub is_available: Option<bool>,
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    uuid: String,
    make: String,
    model: String,
    year: i64,
    vehicle_type: String,
    price_per_day: f64,
    is_available: bool,
    created_at: String,
    updated_at: String,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Self {
            uuid: row.uuid,
            make: row.make,
            model: row.model,
            year: row.year,
            vehicle_type: row.vehicle_type,
            price_per_day: row.price_per_day,
            is_available: row.is_available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl VehicleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a vehicle. Returns the vehicle UUID.
    pub async fn create(&self, vehicle: &NewVehicle) -> Result<String, sqlx::Error> {
        let uuid = uuid::Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO vehicles (uuid, make, model, year, vehicle_type, price_per_day, is_available) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&uuid)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.vehicle_type)
        .bind(vehicle.price_per_day)
        .bind(vehicle.is_available)
        .execute(&self.pool)
        .await?;

        Ok(uuid)
    }

    /// Insert several vehicles in one transaction.
    pub async fn create_many(&self, vehicles: &[NewVehicle]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for vehicle in vehicles {
            sqlx::query(
                "INSERT INTO vehicles (uuid, make, model, year, vehicle_type, price_per_day, is_available) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&vehicle.make)
            .bind(&vehicle.model)
            .bind(vehicle.year)
            .bind(&vehicle.vehicle_type)
            .bind(vehicle.price_per_day)
            .bind(vehicle.is_available)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(vehicles.len() as u64)
    }

    /// Get a vehicle by UUID.
    pub async fn get_by_uuid(&self, uuid: &str) -> Result<Option<Vehicle>, sqlx::Error> {
        let row: Option<VehicleRow> = sqlx::query_as(
            "SELECT uuid, make, model, year, vehicle_type, price_per_day, is_available, created_at, updated_at
             FROM vehicles WHERE uuid = ?",
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Vehicle::from))
    }

    /// List all vehicles, oldest first.
    pub async fn list(&self) -> Result<Vec<Vehicle>, sqlx::Error> {
        let rows: Vec<VehicleRow> = sqlx::query_as(
            "SELECT uuid, make, model, year, vehicle_type, price_per_day, is_available, created_at, updated_at
             FROM vehicles ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Vehicle::from).collect())
    }

    /// Apply a partial update. Returns the updated vehicle, or None if it does not exist.
    pub async fn update(
        &self,
        uuid: &str,
        update: &VehicleUpdate,
    ) -> Result<Option<Vehicle>, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE vehicles SET
                make = COALESCE(?, make),
                model = COALESCE(?, model),
                year = COALESCE(?, year),
                vehicle_type = COALESCE(?, vehicle_type),
                price_per_day = COALESCE(?, price_per_day),
                is_available = COALESCE(?, is_available),
                updated_at = datetime('now')
             WHERE uuid = ?",
        )
        .bind(update.make.as_deref())
        .bind(update.model.as_deref())
        .bind(update.year)
        .bind(update.vehicle_type.as_deref())
        .bind(update.price_per_day)
        .bind(update.is_available)
        .bind(uuid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_uuid(uuid).await
    }

    /// Delete a vehicle. Returns true if a row was removed.
    pub async fn delete(&self, uuid: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM vehicles WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of vehicles in the catalog.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
