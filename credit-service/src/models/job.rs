use super::Credits;
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub vehicle_id: String,
    pub client_phone_number: String,
    pub registration_plate: String,
    pub service: String,
    pub price: f64,
    pub duration_minutes: u32,
    pub status: JobStatus,
    pub charged: Credits,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A carwash customer, unique per tenant by phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A customer's vehicle, unique per client by registration plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    #[serde(rename = "_id")]
    pub id: String,
    pub tenant_id: String,
    pub client_id: String,
    pub registration_plate: String,
    pub make: String,
    pub model: String,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct ClientDetails {
    #[validate(length(min = 1, max = 120, message = "Client name is required"))]
    pub name: String,
    #[validate(length(min = 7, max = 20, message = "A valid phone number is required"))]
    pub phone_number: String,
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Validate)]
pub struct VehicleDetails {
    #[validate(length(min = 2, max = 16, message = "Registration plate is required"))]
    pub registration_plate: String,
    #[validate(length(min = 1, max = 60))]
    pub make: String,
    #[validate(length(min = 1, max = 60))]
    pub model: String,
    pub color: Option<String>,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewJob {
    #[validate(nested)]
    pub client: ClientDetails,
    #[validate(nested)]
    pub vehicle: VehicleDetails,
    #[validate(length(min = 1, max = 120, message = "A service must be selected"))]
    pub service: String,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: u32,
}

/// A validated job whose id is fixed before the ledger commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub id: String,
    pub tenant_id: String,
    pub client: ClientDetails,
    pub vehicle: VehicleDetails,
    pub service: String,
    pub price: f64,
    pub duration_minutes: u32,
}

impl JobDraft {
    pub fn new(tenant_id: &str, job: NewJob) -> Self {
        let NewJob {
            client,
            vehicle,
            service,
            price,
            duration_minutes,
        } = job;
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            client: ClientDetails {
                name: client.name.trim().to_string(),
                phone_number: client.phone_number.trim().to_string(),
                email: client
                    .email
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty()),
            },
            vehicle: VehicleDetails {
                registration_plate: normalize_plate(&vehicle.registration_plate),
                ..vehicle
            },
            service: service.trim().to_string(),
            price,
            duration_minutes,
        }
    }

    pub fn new_client(&self) -> Client {
        let now = DateTime::now();
        Client {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.clone(),
            name: self.client.name.clone(),
            phone_number: self.client.phone_number.clone(),
            email: self.client.email.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_vehicle(&self, client_id: &str) -> Vehicle {
        Vehicle {
            id: Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id.clone(),
            client_id: client_id.to_string(),
            registration_plate: self.vehicle.registration_plate.clone(),
            make: self.vehicle.make.clone(),
            model: self.vehicle.model.clone(),
            color: self.vehicle.color.clone(),
            vehicle_type: self.vehicle.vehicle_type.clone(),
            created_at: DateTime::now(),
        }
    }

    pub fn into_job(self, client_id: String, vehicle_id: String, charged: Credits) -> Job {
        let now = DateTime::now();
        Job {
            id: self.id,
            tenant_id: self.tenant_id,
            client_id,
            vehicle_id,
            client_phone_number: self.client.phone_number,
            registration_plate: self.vehicle.registration_plate,
            service: self.service,
            price: self.price,
            duration_minutes: self.duration_minutes,
            status: JobStatus::Pending,
            charged,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Upper-cases a plate and drops interior whitespace: "kda 123a" -> "KDA123A".
pub fn normalize_plate(plate: &str) -> String {
    plate
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}
