mod http;
mod page;
mod traits;

pub use http::{HttpTransport, HttpTransportFactory};
pub use page::{is_completed_url, PageContent, COMPLETED_PATH};
pub use traits::{Transport, TransportConfig, TransportError, TransportFactory};
