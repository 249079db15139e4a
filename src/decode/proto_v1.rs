//! `/v1/datapoint` protobuf body: a stream of length-delimited
//! `DataPoint` messages. Type always defaults to GAUGE, same as the
//! JSON v1 sibling.

use bytes::{Buf, Bytes};
use prost::Message;

use super::Decoder;
use crate::model::{DecodedItems, MetricType};
use crate::proto;

pub struct ProtoV1Decoder;

impl Decoder for ProtoV1Decoder {
    fn protocol(&self) -> &'static str {
        "proto_v1"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let mut buf = Bytes::copy_from_slice(body);
        let mut datapoints = Vec::new();

        while buf.has_remaining() {
            let wire =
                proto::DataPoint::decode_length_delimited(&mut buf).map_err(|e| e.to_string())?;
            let mut dp = proto::wire_datapoint_to_domain(&wire)
                .ok_or_else(|| "datapoint missing metric or value".to_string())?;
            dp.metric_type = MetricType::Gauge;
            datapoints.push(dp);
        }

        if datapoints.is_empty() {
            return Err("empty datapoint stream".into());
        }

        Ok(DecodedItems::Datapoints(datapoints))
    }
}
