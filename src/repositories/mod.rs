mod invite;
mod memory;

#[cfg(test)]
pub use invite::MockInviteRepositoryTrait;
pub use invite::{InviteRepository, InviteRepositoryTrait};
pub use memory::InMemoryInviteRepository;
