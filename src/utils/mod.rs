//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    load_dataset, prepare_dataset, target_vector, train_test_split, validate_columns, DataLoader,
    SplitConfig,
};
