pub mod message;

pub use message::{
    connected_ack, DisconnectFrame, DisconnectNotice, InboundMessage, MedicalDataBroadcast,
    MedicalDataFrame, MonitorInitFrame, OutboundMessage,
};
