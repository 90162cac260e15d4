pub mod walk;

pub use walk::collect_import_files;
