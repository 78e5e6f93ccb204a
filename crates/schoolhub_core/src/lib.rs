pub mod accounts;
pub mod clock;
pub mod coursework;
pub mod directory;
pub mod domain;
pub mod enrollment;
pub mod grades;
pub mod materials;
pub mod memory;
pub mod ports;
pub mod roster;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use accounts::Accounts;
pub use clock::{FixedClock, SystemClock};
pub use coursework::{Coursework, TaskView};
pub use directory::{GroupDirectory, GroupView};
pub use domain::{
    AccountStatus, Actor, AuthSession, Course, Credentials, Enrollment, EnrollmentStatus,
    FileRef, Group, Material, Profile, Role, ScheduleSlot, Submission, Task, User,
};
pub use enrollment::EnrollmentService;
pub use grades::{average_grade, CourseAverage, GradeBook};
pub use materials::MaterialLibrary;
pub use memory::InMemoryStore;
pub use ports::{Clock, EnrollmentFilter, EntityStore, PortError, PortResult, ScopeFilter};
pub use roster::{RosterAggregator, StudentSummary};
pub use status::{derive_status, RawTimestamp, TaskStatus};
pub use store::BoundedStore;
