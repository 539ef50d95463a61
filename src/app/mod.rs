// Application layer: wires adapters and core into runnable jobs.

pub mod service;

pub use service::PackageService;
