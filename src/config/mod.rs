mod settings;

pub use settings::DatabaseSettings;
