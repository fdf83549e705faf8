pub mod alert_transport;
pub mod embedder;
pub mod relational;
pub mod vector_store;
pub mod weather_provider;

pub use alert_transport::{AlertTransport, DeliveryResult};
pub use embedder::Embedder;
pub use relational::{Relational, ScheduleRecord, ScheduledBurnRow};
pub use vector_store::{VectorMatch, VectorStore};
pub use weather_provider::WeatherProvider;
