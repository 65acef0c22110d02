// services/mod.rs - Remote Service Clients
// One shared HTTP client (read-only after start-up) feeds both service clients.

pub mod nanana;
pub mod ytconvert;

use crate::config::ServiceConfig;
use crate::error::FlowError;
use crate::mailbox::AkunlamaMailbox;
use nanana::NananaClient;
use serenity::prelude::TypeMapKey;
use std::sync::Arc;
use ytconvert::YtConvertClient;

pub struct MediaServices {
    pub editor: NananaClient,
    pub converter: YtConvertClient,
}

impl MediaServices {
    pub fn from_config(config: &ServiceConfig) -> Result<Self, FlowError> {
        let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;

        let mailbox = Arc::new(AkunlamaMailbox::new(
            http.clone(),
            &config.akunlama_base_url,
            &config.mail_domain,
            config.otp_poll.clone(),
        ));

        let editor = NananaClient::new(
            http.clone(),
            &config.nanana_base_url,
            mailbox,
            config.editimg_poll.clone(),
        );

        let converter = YtConvertClient::new(
            http,
            &config.ytconvert_primary_url,
            &config.ytconvert_fallback_url,
            &config.oembed_url,
            config.ytmp4_poll.clone(),
        );

        Ok(Self { editor, converter })
    }
}

/// TypeMap key for the shared service clients
pub struct MediaServicesKey;
impl TypeMapKey for MediaServicesKey {
    type Value = Arc<MediaServices>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_services_build_from_default_config() {
        assert!(MediaServices::from_config(&ServiceConfig::default()).is_ok());
    }
}
