//! Project membership entities.

pub mod member;

pub use member::ProjectMember;
