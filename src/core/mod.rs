//! Process-wide state: settings, the memory manager, allocator scopes.

pub mod manager;
pub mod scope;
pub mod settings;
pub mod tls;
