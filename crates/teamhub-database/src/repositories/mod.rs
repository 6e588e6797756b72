//! PostgreSQL repository implementations of the presence persistence traits.

pub mod presence_session;
pub mod project_member;

pub use presence_session::PresenceSessionRepository;
pub use project_member::ProjectMemberRepository;
