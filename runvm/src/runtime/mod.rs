//! Runtime-wide configuration: state directory layout and backend options.

pub mod layout;
pub mod options;

pub use layout::ContainerLayout;
pub use options::RuntimeOptions;
