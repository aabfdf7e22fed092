pub mod auth_service;
pub mod personnel_service;
pub mod reconciler;
pub mod scoper;
pub mod task_service;
pub mod user_service;
pub mod weapon_service;

pub use auth_service::AuthService;
pub use personnel_service::PersonnelService;
pub use task_service::TaskService;
pub use user_service::UserService;
pub use weapon_service::WeaponService;
