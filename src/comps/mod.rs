mod clock;
mod locks;
mod result;
mod service;

#[cfg(test)]
pub use clock::Clock;
pub use result::RefreshRequest;
pub use service::ComparablesService;
