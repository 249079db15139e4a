//! `/v2/datapoint` protobuf body: a stream of length-delimited
//! `DataPoint` messages carrying explicit metric type and dimensions,
//! unlike the v1 protobuf decoder.

use bytes::{Buf, Bytes};
use prost::Message;

use super::Decoder;
use crate::model::DecodedItems;
use crate::proto;

pub struct ProtoV2Decoder;

impl Decoder for ProtoV2Decoder {
    fn protocol(&self) -> &'static str {
        "proto_v2"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let mut buf = Bytes::copy_from_slice(body);
        let mut datapoints = Vec::new();

        while buf.has_remaining() {
            let wire =
                proto::DataPoint::decode_length_delimited(&mut buf).map_err(|e| e.to_string())?;
            let dp = proto::wire_datapoint_to_domain(&wire)
                .ok_or_else(|| "datapoint missing metric or value".to_string())?;
            datapoints.push(dp);
        }

        if datapoints.is_empty() {
            return Err("empty datapoint stream".into());
        }

        Ok(DecodedItems::Datapoints(datapoints))
    }
}
