use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct DeviceMetrics {
    pub tx_packets: IntCounter,
    pub rx_records: IntCounter,
    pub malformed_responses: IntCounter,
    pub failed_reads: IntCounter,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub dev: DeviceMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let dev = DeviceMetrics {
            tx_packets: IntCounter::new("dofbot_tx_packets", "Total packets written to the arm")?,
            rx_records: IntCounter::new(
                "dofbot_rx_records",
                "Total servo position records decoded",
            )?,
            malformed_responses: IntCounter::new(
                "dofbot_malformed_responses",
                "Responses dropped for a bad marker, length or checksum",
            )?,
            failed_reads: IntCounter::new(
                "dofbot_failed_reads",
                "Servo reads that produced no usable angle",
            )?,
        };
        registry.register(Box::new(dev.tx_packets.clone()))?;
        registry.register(Box::new(dev.rx_records.clone()))?;
        registry.register(Box::new(dev.malformed_responses.clone()))?;
        registry.register(Box::new(dev.failed_reads.clone()))?;
        Ok(Self { registry, dev })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
