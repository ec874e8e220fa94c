//! Read-only customer lookup service.
//!
//! Republishes the customers export as JSON. The data is loaded once at
//! startup; a failed load is remembered and reported on every request so
//! clients can tell it apart from an empty dataset.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde_json::json;
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{ApiError, BindSnafu, ServeSnafu};
use crate::model::CustomerRecord;
use crate::source::{SourceKind, SourceLoader};

const WELCOME: &str = "Welcome to the Olist Customer Data API. Access /customers to get the data.";

/// Outcome of the startup load.
#[derive(Debug, Clone)]
pub enum CustomerData {
    Loaded(Vec<CustomerRecord>),
    Failed(String),
}

impl CustomerData {
    /// Load the customers export, keeping the failure reason if any.
    pub async fn load(loader: &SourceLoader, file: &str) -> Self {
        match loader
            .try_load::<CustomerRecord>(SourceKind::Customers, file)
            .await
        {
            Ok(customers) => {
                info!("Loaded {} customer records successfully.", customers.len());
                CustomerData::Loaded(customers)
            }
            Err(e) => {
                let reason = snafu::Report::from_error(e).to_string();
                error!("Customer data could not be loaded: {}", reason);
                CustomerData::Failed(reason)
            }
        }
    }
}

pub fn router(data: Arc<CustomerData>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/customers", get(customers_handler))
        .route("/health", get(health_handler))
        .with_state(data)
}

/// Serve the lookup API on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    data: Arc<CustomerData>,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    let listener = TcpListener::bind(addr).await.context(BindSnafu {
        address: addr.to_string(),
    })?;
    info!("Customer API listening on http://{}", addr);

    axum::serve(listener, router(data))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context(ServeSnafu)
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": WELCOME }))
}

async fn customers_handler(State(data): State<Arc<CustomerData>>) -> Response {
    match data.as_ref() {
        CustomerData::Loaded(customers) => Json(customers.clone()).into_response(),
        CustomerData::Failed(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Data could not be loaded." })),
        )
            .into_response(),
    }
}

async fn health_handler() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CsvReader;
    use crate::storage::StorageProvider;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn customer(id: &str) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_string(),
            customer_unique_id: Some(format!("u-{id}")),
            zip_prefix: Some(14409),
            city: Some("franca".to_string()),
            state: Some("SP".to_string()),
        }
    }

    #[tokio::test]
    async fn test_customers_returned_with_source_column_names() {
        let data = Arc::new(CustomerData::Loaded(vec![customer("c1"), customer("c2")]));
        let response = customers_handler(State(data)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["customer_id"], "c1");
        assert_eq!(json[0]["customer_zip_code_prefix"], 14409);
        assert_eq!(json[1]["customer_state"], "SP");
    }

    #[tokio::test]
    async fn test_failed_load_is_a_server_error() {
        let data = Arc::new(CustomerData::Failed("file missing".to_string()));
        let response = customers_handler(State(data)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Data could not be loaded.");
    }

    #[tokio::test]
    async fn test_empty_load_is_an_empty_array() {
        let data = Arc::new(CustomerData::Loaded(Vec::new()));
        let response = customers_handler(State(data)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let Json(body) = root_handler().await;
        assert_eq!(body["message"], WELCOME);
        assert_eq!(health_handler().await, "ok\n");
    }

    #[tokio::test]
    async fn test_load_distinguishes_missing_file_from_empty_file() {
        let dir = TempDir::new().unwrap();
        let storage =
            StorageProvider::for_url_with_options(dir.path().to_str().unwrap(), HashMap::new())
                .await
                .unwrap();
        let loader = SourceLoader::new(Arc::new(storage), CsvReader::default());

        let missing = CustomerData::load(&loader, "customers.csv").await;
        assert!(matches!(missing, CustomerData::Failed(_)));

        std::fs::write(
            dir.path().join("customers.csv"),
            "customer_id,customer_unique_id,customer_zip_code_prefix,customer_city,customer_state\n",
        )
        .unwrap();
        let empty = CustomerData::load(&loader, "customers.csv").await;
        assert!(matches!(empty, CustomerData::Loaded(ref c) if c.is_empty()));
    }
}
