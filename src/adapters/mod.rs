// Adapters layer: concrete MemberRepository implementations.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryMemberRepository;
#[cfg(feature = "postgres")]
pub use postgres::PgMemberRepository;
