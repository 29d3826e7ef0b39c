//! Shared fixtures for relay integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use parlor_core::{ConnectionId, Response, SendError};
use parlor_relay::{ChatService, ConnectionEvents, FrameSink};

/// Sink that records every frame handed to it.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().clone()
    }

    pub fn responses(&self) -> Vec<Response> {
        self.frames()
            .iter()
            .map(|f| Response::decode(f).unwrap())
            .collect()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

impl FrameSink for RecordingSink {
    fn send(&self, frame: Arc<str>) -> Result<(), SendError> {
        self.frames.lock().push(frame.to_string());
        Ok(())
    }
}

/// A connected test client.
pub struct Client {
    pub id: ConnectionId,
    pub sink: Arc<RecordingSink>,
}

impl Client {
    pub fn connect(svc: &ChatService, id: &str) -> Self {
        let id = ConnectionId::from(id);
        let sink = RecordingSink::new();
        svc.on_connect(id.clone(), sink.clone()).unwrap();
        Self { id, sink }
    }

    pub fn register(&self, svc: &ChatService, name: &str) {
        svc.on_receive(&self.id, &register_frame(name));
    }

    pub fn rename(&self, svc: &ChatService, name: &str) {
        svc.on_receive(&self.id, &rename_frame(name));
    }

    pub fn say(&self, svc: &ChatService, text: &str) {
        svc.on_receive(&self.id, &message_frame(text));
    }

    pub fn leave(&self, svc: &ChatService) {
        svc.on_disconnect(&self.id);
    }
}

pub fn register_frame(name: &str) -> String {
    serde_json::json!({ "Type": 0, "Name": name }).to_string()
}

pub fn message_frame(text: &str) -> String {
    serde_json::json!({ "Type": 1, "Message": text }).to_string()
}

pub fn rename_frame(name: &str) -> String {
    serde_json::json!({ "Type": 2, "Name": name }).to_string()
}

pub fn roster(names: &[&str]) -> Response {
    Response::user_count(names.iter().map(|n| (*n).to_owned()).collect())
}
