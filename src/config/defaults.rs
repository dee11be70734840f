use super::*;

impl Default for AccessoryConfig {
    fn default() -> Self {
        Self {
            name: "Energy Price".to_string(),
            manufacturer: "Day Ahead Energy Price".to_string(),
            model: "Monitor".to_string(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: 15,
            min_interval_minutes: None,
            min_rate: -100.0,
            max_rate: 100.0,
            request_timeout_seconds: 30,
            publish_decimals: None,
            startup: StartupConfig::default(),
        }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            wait_for_ready: true,
            delay_ms: 1000,
        }
    }
}

impl Default for DayAheadConfig {
    fn default() -> Self {
        Self {
            base_url: "https://web-api.tp.entsoe.eu/api".to_string(),
            document_type: "A44".to_string(),
            in_domain: "10YAT-APG------L".to_string(),
            out_domain: "10YAT-APG------L".to_string(),
            api_key: None,
            api_key_location: ApiKeyLocation::Header,
        }
    }
}

impl Default for HourlyAverageConfig {
    fn default() -> Self {
        Self {
            base_url: "https://hourlypricing.comed.com/api".to_string(),
            query_type: "currenthouraverage".to_string(),
        }
    }
}

impl Default for SinksConfig {
    fn default() -> Self {
        Self {
            log: true,
            webhook: None,
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            bearer_token: None,
            timeout_seconds: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/pricewatch.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8089,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            accessory: AccessoryConfig::default(),
            poller: PollerConfig::default(),
            source: SourceConfig::default(),
            conversion: UnitConversion::default(),
            sinks: SinksConfig::default(),
            logging: LoggingConfig::default(),
            web: WebConfig::default(),
        }
    }
}
