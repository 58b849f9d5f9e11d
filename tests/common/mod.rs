//! In-memory stand-in for a manager connection.

#![allow(dead_code)]

use asterisk_ami_tokio::{Action, AmiResult, EventListeners, Response, Transport};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Decides the reply to an action and may emit events, either inline or from
/// a spawned task.
pub type Script = Box<dyn Fn(&Action, &EventListeners) -> Response + Send + Sync>;

pub struct FakeSwitch {
    listeners: EventListeners,
    sent: Mutex<Vec<Action>>,
    script: Script,
}

impl FakeSwitch {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&Action, &EventListeners) -> Response + Send + Sync + 'static,
    {
        Arc::new(Self {
            listeners: EventListeners::new(),
            sent: Mutex::new(Vec::new()),
            script: Box::new(script),
        })
    }

    pub fn sent(&self) -> Vec<Action> {
        self.sent
            .lock()
            .unwrap()
            .clone()
    }

    pub fn listeners_handle(&self) -> EventListeners {
        self.listeners
            .clone()
    }
}

impl Transport for FakeSwitch {
    fn send_action(&self, action: Action) -> impl Future<Output = AmiResult<Response>> + Send {
        let response = (self.script)(&action, &self.listeners);
        self.sent
            .lock()
            .unwrap()
            .push(action);
        std::future::ready(Ok(response))
    }

    fn listeners(&self) -> &EventListeners {
        &self.listeners
    }
}

pub fn response(raw: &str) -> Response {
    Response::decode(raw).unwrap()
}

/// Dispatch `blocks` from a background task after `delay`.
pub fn emit_later(listeners: &EventListeners, delay: Duration, blocks: Vec<String>) {
    let listeners = listeners.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for block in blocks {
            listeners
                .dispatch_raw(&block)
                .unwrap();
        }
    });
}

pub const START: &str = "Event: AsyncAGIStart\r\n\
                         Privilege: agi,all\r\n\
                         Channel: SIP/200-00000002\r\n\
                         Uniqueid: 1700000000.2\r\n\
                         Env: agi_request%3A%20async%0Aagi_channel%3A%20SIP%2F200-00000002%0Aagi_context%3A%20default%0Aagi_extension%3A%20600%0Aagi_arg_1%3A%20hello%0A%0A\r\n";
