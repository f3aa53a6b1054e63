use crate::SharedCache;
use prometheus_client::{
    collector::Collector,
    encoding::{DescriptorEncoder, EncodeMetric},
    metrics::{gauge::ConstGauge, MetricType},
    registry::Registry,
};

#[derive(Debug)]
struct Instrumented(SharedCache);

pub fn register(reg: &mut Registry, cache: SharedCache) {
    reg.register_collector(Box::new(Instrumented(cache)));
}

impl Collector for Instrumented {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), std::fmt::Error> {
        let synced = ConstGauge::new(self.0.is_synced() as u32);
        let synced_encoder = encoder.encode_descriptor(
            "synced",
            "Whether the cache has completed its startup sync",
            None,
            MetricType::Gauge,
        )?;
        synced.encode(synced_encoder)?;

        let state = self.0.read();
        let mut size_encoder = encoder.encode_descriptor(
            "size",
            "The number of entries in each collection of the cache",
            None,
            MetricType::Gauge,
        )?;
        for (kind, len) in [
            ("gateway", state.gateways.len()),
            ("httproute", state.routes.len()),
            ("service", state.services.len()),
            ("endpoints", state.endpoints.len()),
            ("node", state.nodes.len()),
        ] {
            let labels = vec![("kind", kind)];
            let size = ConstGauge::new(len as u32);
            size.encode(size_encoder.encode_family(&labels)?)?;
        }

        Ok(())
    }
}
