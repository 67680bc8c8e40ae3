use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use motorbus_frame::{Payload, Response, ResponseStatus, UnitAddress};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum RecordOutput {
    Status {
        firmware: f32,
        angle: i32,
        limit_switches: [bool; 2],
    },
    Light {
        voltage: bool,
        color: String,
        frequency: f32,
    },
    Generic {
        mode: u8,
        data: String,
    },
}

impl From<&Payload> for RecordOutput {
    fn from(payload: &Payload) -> Self {
        match payload {
            Payload::Status(record) => RecordOutput::Status {
                firmware: record.firmware,
                angle: record.angle,
                limit_switches: record.limit_switches,
            },
            Payload::Light(record) => RecordOutput::Light {
                voltage: record.voltage,
                color: record.color.to_string(),
                frequency: record.frequency,
            },
            Payload::Generic(record) => RecordOutput::Generic {
                mode: record.mode,
                data: hex(&record.data),
            },
        }
    }
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    schema_id: &'a str,
    target: String,
    family: &'a str,
    status: &'a str,
    #[serde(flatten)]
    record: RecordOutput,
    timestamp: String,
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    schema_id: &'a str,
    command: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    attempts: Option<usize>,
    timestamp: String,
}

#[derive(Serialize)]
struct SimulationOutput<'a> {
    schema_id: &'a str,
    commands: u64,
    replies: u64,
    stops: u64,
}

/// Print a device's decoded status reply. `Raw` writes the reply frame bytes.
/// Print a status reply. `raw` writes the frame exactly as it was received.
pub fn print_status(unit: &UnitAddress, response: &Response, format: OutputFormat) {
    let status = response.status;
    let payload = &response.payload;
    match format {
        OutputFormat::Json => {
            let out = StatusOutput {
                schema_id: "https://schemas.3leaps.dev/motorbus/cli/v1/device-status.schema.json",
                target: unit.to_string(),
                family: unit.family().name(),
                status: status.name(),
                record: RecordOutput::from(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["target".to_string(), unit.to_string()]);
            for (field, value) in record_fields(status, payload) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let fields: Vec<String> = record_fields(status, payload)
                .into_iter()
                .map(|(field, value)| format!("{field}={value}"))
                .collect();
            println!("{unit} {}", fields.join(" "));
        }
        OutputFormat::Raw => print_raw(response.frame.as_bytes()),
    }
}

/// Acknowledge a command that expects no reply.
pub fn print_sent(command: &str, target: &str, attempts: Option<usize>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                schema_id: "https://schemas.3leaps.dev/motorbus/cli/v1/command-sent.schema.json",
                command,
                target,
                attempts,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "TARGET", "ATTEMPTS"])
                .add_row(vec![
                    command.to_string(),
                    target.to_string(),
                    attempts.map_or_else(|| "-".to_string(), |n| n.to_string()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => match attempts {
            Some(attempts) => println!("{command} sent to {target} ({attempts} attempts)"),
            None => println!("{command} sent to {target}"),
        },
    }
}

pub fn print_simulation_summary(commands: u64, replies: u64, stops: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SimulationOutput {
                schema_id: "https://schemas.3leaps.dev/motorbus/cli/v1/simulation-summary.schema.json",
                commands,
                replies,
                stops,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["COMMANDS", "REPLIES", "STOPS"])
                .add_row(vec![commands, replies, stops]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("commands={commands} replies={replies} stops={stops}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn record_fields(status: ResponseStatus, payload: &Payload) -> Vec<(&'static str, String)> {
    let mut fields = vec![("status", status.to_string())];
    match payload {
        Payload::Status(record) => {
            fields.push(("firmware", format!("{:.2}", record.firmware)));
            fields.push(("angle", record.angle.to_string()));
            fields.push(("limit_switch_0", record.limit_switches[0].to_string()));
            fields.push(("limit_switch_1", record.limit_switches[1].to_string()));
        }
        Payload::Light(record) => {
            fields.push(("voltage", record.voltage.to_string()));
            fields.push(("color", record.color.to_string()));
            fields.push(("frequency", format!("{:.2}", record.frequency)));
        }
        Payload::Generic(record) => {
            fields.push(("mode", record.mode.to_string()));
            fields.push(("data", hex(&record.data)));
        }
    }
    fields
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
