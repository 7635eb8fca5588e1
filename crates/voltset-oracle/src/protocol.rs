//! Line-delimited JSON protocol between voltset and an engine process.
//!
//! Each request and each response is one JSON object on its own line. The
//! engine answers every request with exactly one response, in order.
//!
//! ```text
//! -> {"op":"open","circuit":"Master.dss","max_iterations":1000,"max_control_iterations":100,"protocol":1}
//! <- {"status":"ok"}
//! -> {"op":"names","category":"load"}
//! <- {"status":"names","names":["L1","L2"]}
//! -> {"op":"set","category":"load","name":"L1","kw":12.5,"kvar":2.1}
//! <- {"status":"ok"}
//! -> {"op":"solve"}
//! <- {"status":"solution","converged":true,"buses":[{"bus":"B1","vm_pu":1.01}]}
//! -> {"op":"switch","kind":"line","name":"L12","in_service":false}
//! <- {"status":"ok"}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use voltset_core::{BranchKind, BusVoltage, Category};

use crate::error::OracleResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Open {
        circuit: String,
        max_iterations: u32,
        max_control_iterations: u32,
        protocol: i32,
    },
    Names {
        category: Category,
    },
    Get {
        category: Category,
        name: String,
    },
    Set {
        category: Category,
        name: String,
        kw: f64,
        kvar: f64,
    },
    Solve,
    /// Take a line or transformer out of service, or put it back.
    Switch {
        kind: BranchKind,
        name: String,
        in_service: bool,
    },
    Close,
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::Open { .. } => "open",
            Request::Names { .. } => "names",
            Request::Get { .. } => "get",
            Request::Set { .. } => "set",
            Request::Solve => "solve",
            Request::Switch { .. } => "switch",
            Request::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Names { names: Vec<String> },
    Setpoint { kw: f64, kvar: f64 },
    Solution { converged: bool, buses: Vec<BusVoltage> },
    Error { message: String },
}

/// Write one message as a JSON line and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, message: &T) -> OracleResult<()> {
    serde_json::to_writer(&mut *writer, message)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read the next non-blank line. `None` means the peer closed the stream.
pub fn read_line<R: BufRead>(reader: &mut R) -> OracleResult<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return Ok(Some(line.trim().to_string()));
        }
    }
}

pub fn parse_message<T: DeserializeOwned>(line: &str) -> OracleResult<T> {
    Ok(serde_json::from_str(line.trim())?)
}

/// Read the next non-blank JSON line. `None` means the peer closed the stream.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> OracleResult<Option<T>> {
    read_line(reader)?.map(|line| parse_message(&line)).transpose()
}
