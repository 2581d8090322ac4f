pub mod account_model;
pub mod daily_model;
pub mod link_model;

pub use account_model::{
    Account, Counterpart, DoctorDetail, DoctorListing, PatientDetail, ProfileView, Role, RoleDetail,
};
pub use daily_model::{HabitEntry, VitalEntry};
pub use link_model::{ConsentLink, ConsentState, Party};
