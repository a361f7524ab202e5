use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::config::{is_production, EmailProviderConfig, Settings};
use crate::negotiation::{CatalogError, NegotiationEngine, OfferSigner, PropertyCatalog, StaticCatalog, TokenError};
use crate::notification::{
    EmailTransport, HttpEmailTransport, LogEmailTransport, LogSmsTransport, NotificationQueue,
    SmsTransport,
};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to load property catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Failed to set up offer signing: {0}")]
    Signer(#[from] TokenError),

    #[error("notifications.email.api_url is required in production")]
    MissingEmailProvider,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub catalog: Arc<dyn PropertyCatalog>,
    pub engine: Arc<NegotiationEngine>,
    pub queue: Arc<NotificationQueue>,
    pub start_time: Instant,
}

impl AppState {
    /// Load the catalog from the configured files and pick the email relay
    /// from `notifications.email`. SMS always goes to the log transport.
    pub fn new(settings: Settings) -> Result<Self, StateError> {
        let negotiation = &settings.negotiation;
        let catalog = StaticCatalog::load(
            negotiation.properties_path.as_deref(),
            negotiation.discounts_path.as_deref(),
            negotiation.default_rate,
        )?;
        let email = email_transport(&settings.notifications.email, is_production())?;

        Self::with_components(
            settings,
            Arc::new(catalog),
            email,
            Arc::new(LogSmsTransport),
        )
    }

    pub fn with_components(
        settings: Settings,
        catalog: Arc<dyn PropertyCatalog>,
        email: Arc<dyn EmailTransport>,
        sms: Arc<dyn SmsTransport>,
    ) -> Result<Self, StateError> {
        let signer = OfferSigner::from_config(&settings.negotiation)?;
        let engine = Arc::new(NegotiationEngine::new(
            catalog.clone(),
            signer,
            &settings.negotiation,
        ));
        let queue = Arc::new(NotificationQueue::new(&settings.notifications, email, sms));

        Ok(Self {
            settings: Arc::new(settings),
            catalog,
            engine,
            queue,
            start_time: Instant::now(),
        })
    }
}

fn email_transport(
    config: &EmailProviderConfig,
    production: bool,
) -> Result<Arc<dyn EmailTransport>, StateError> {
    match config.api_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => {
            tracing::info!(api_url = %url, "Email relay configured");
            Ok(Arc::new(HttpEmailTransport::new(url, config.api_key.clone())))
        }
        _ if production => Err(StateError::MissingEmailProvider),
        _ => {
            tracing::warn!("No email relay configured, email goes to the log");
            Ok(Arc::new(LogEmailTransport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_transport_selection() {
        let unset = EmailProviderConfig::default();
        assert!(email_transport(&unset, false).is_ok());
        assert!(matches!(
            email_transport(&unset, true),
            Err(StateError::MissingEmailProvider)
        ));

        let blank = EmailProviderConfig {
            api_url: Some("  ".into()),
            api_key: None,
        };
        assert!(email_transport(&blank, true).is_err());

        let relay = EmailProviderConfig {
            api_url: Some("http://127.0.0.1:9/send".into()),
            api_key: Some("relay-key".into()),
        };
        assert!(email_transport(&relay, true).is_ok());
    }
}
