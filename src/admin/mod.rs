//! Admin accounts live apart from regular users. They are provisioned out of
//! band (no self-service registration) and their actions land in the
//! `admin_actions` audit trail.

pub mod models;
pub mod repo;

pub use models::AdminUser;
pub use repo::AdminRepo;
