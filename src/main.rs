use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use crossbeam::channel::RecvTimeoutError;
use rich_rust::markup;
use rich_rust::prelude::*;
use rich_rust::r#box::ROUNDED;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use minikb::led::{self, LedEncoder};
use minikb::mapping;
use minikb::packet::{self, Packet, PACKET_LEN};
use minikb::probe;
use minikb::profile::{self, Profile};
use minikb::session::InterfaceOutcome;
use minikb::usb_hid;
use minikb::{
    parse_action, Button, DeviceConfig, DeviceSession, KeyAction, KeyProgrammer, MonitorEvent,
    MonitorOptions, PacketRecorder, RusbBackend, StateScope,
};

const RULE: &str =
    "[#3498db]─────────────────────────────────────────────────────────────────────[/]";

#[derive(Parser)]
#[command(name = "minikb")]
#[command(version)]
#[command(about = "Programmer for 6-key + rotary encoder USB macro keyboards (1189:8890)")]
#[command(
    long_about = "Programs key assignments and LED modes of the 6-key + knob macro pad (USB 1189:8890) over its vendor HID protocol, and monitors what the keys send."
)]
struct Cli {
    /// USB vendor id (hex)
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "1189")]
    vid: u16,

    /// USB product id (hex)
    #[arg(long, global = true, value_parser = parse_hex_u16, default_value = "8890")]
    pid: u16,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the keyboard and show its interfaces and endpoints
    Info,

    /// List key and modifier names usable in actions
    ListKeys,

    /// Program buttons and knob (e.g. --button1 ctrl-c --knob-press mute)
    Program {
        #[arg(long)]
        button1: Option<String>,
        #[arg(long)]
        button2: Option<String>,
        #[arg(long)]
        button3: Option<String>,
        #[arg(long)]
        button4: Option<String>,
        #[arg(long)]
        button5: Option<String>,
        #[arg(long)]
        button6: Option<String>,
        /// Knob rotated counter-clockwise
        #[arg(long)]
        knob_left: Option<String>,
        #[arg(long)]
        knob_press: Option<String>,
        /// Knob rotated clockwise
        #[arg(long)]
        knob_right: Option<String>,

        /// Start from the default layout (F13..F21)
        #[arg(long)]
        default: bool,

        /// Start from a JSON profile (button name -> key name)
        #[arg(long, conflicts_with = "default")]
        profile: Option<PathBuf>,

        /// Save the resulting layout to ~/.minikb_config.json
        #[arg(long)]
        save: bool,

        /// Dry run - print the packets instead of writing to the device
        #[arg(long)]
        dry_run: bool,

        /// Start monitor mode after programming to test the keys
        #[arg(long, short = 'm')]
        monitor: bool,
    },

    /// Apply a mapping.yaml (ch57x-keyboard-tool format)
    Apply {
        mapping: PathBuf,

        /// Layer of the document to program
        #[arg(long, default_value = "0")]
        layer: usize,

        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a mapping.yaml and print it normalized
    Check { mapping: PathBuf },

    /// Set the LED mode (experimental: the LED protocol is not known)
    Led {
        /// Mode byte (0-255)
        #[arg(long, required_unless_present = "list")]
        mode: Option<u8>,

        /// Packet layout to use (see --list)
        #[arg(long, conflicts_with = "all")]
        encoder: Option<String>,

        /// Try every layout in order
        #[arg(long)]
        all: bool,

        /// List the known layouts
        #[arg(long)]
        list: bool,

        #[arg(long)]
        dry_run: bool,
    },

    /// Monitor key presses in real-time
    Monitor {
        /// Duration in seconds (0 = until Ctrl+C)
        #[arg(short, long, default_value = "30")]
        duration: u64,

        /// Share pressed-key state across input endpoints
        #[arg(long)]
        shared_state: bool,
    },

    /// Send one raw frame (hex, report id included; zero padded to 65 bytes)
    Raw {
        #[arg(long)]
        data: String,

        #[arg(long)]
        dry_run: bool,
    },

    /// Generate shell completions
    Completions { shell: Shell },
}

fn parse_hex_u16(s: &str) -> std::result::Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid hex id '{}': {}", s, e))
}

fn parse_cli_action(button: Button, text: &str) -> Result<KeyAction> {
    parse_action(text).with_context(|| format!("Invalid action for {}", button))
}

struct MiniKb {
    console: Console,
    config: DeviceConfig,
}

impl MiniKb {
    fn new(config: DeviceConfig) -> Self {
        Self {
            console: Console::new(),
            config,
        }
    }

    fn print_banner(&self) {
        self.console.print(
            "[bold #3498db]╭─────────────────────────────────────────────────────────────────╮[/]",
        );
        self.console.print(&format!(
            "[bold #3498db]│[/]  [bold #f39c12]⌨[/]  [bold white]MINIKB[/] [dim]6 keys + knob programmer[/]          [#95a5a6]{:04x}:{:04x}[/]       [bold #3498db]│[/]",
            self.config.vendor_id, self.config.product_id
        ));
        self.console.print(
            "[bold #3498db]╰─────────────────────────────────────────────────────────────────╯[/]",
        );
        self.console.print("");
    }

    fn connect(&self) -> Result<DeviceSession<RusbBackend>> {
        let mut session = DeviceSession::new(RusbBackend, self.config.clone());
        let report = session.connect().context(
            "Failed to connect (is the keyboard plugged in? you may need sudo or a udev rule)",
        )?;

        for outcome in &report.interfaces {
            self.print_outcome(outcome);
        }
        let endpoints: Vec<String> = report
            .endpoints
            .iter()
            .map(|ep| format!("0x{:02X}", ep.address))
            .collect();
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] Connected, input endpoints: [bold]{}[/]{}",
            endpoints.join(", "),
            if report.used_fallback_endpoint {
                " [dim](fallback)[/]"
            } else {
                ""
            }
        ));
        self.console.print("");
        Ok(session)
    }

    fn disconnect(&self, session: &mut DeviceSession<RusbBackend>) {
        match session.disconnect() {
            Ok(outcomes) => {
                for outcome in outcomes.iter().filter(|o| o.result.is_err()) {
                    self.print_outcome(outcome);
                }
            }
            // The session is torn down on drop instead.
            Err(e) => self
                .console
                .print(&format!("  [bold #f39c12]⚠[/] Disconnect deferred [dim]({})[/]", e)),
        }
    }

    fn print_outcome(&self, outcome: &InterfaceOutcome) {
        match &outcome.result {
            Ok(()) => self.console.print(&format!(
                "  [#2ecc71]→[/] Interface {}: {}",
                outcome.interface, outcome.step
            )),
            Err(e) => self.console.print(&format!(
                "  [bold #f39c12]⚠[/] Interface {}: {} failed [dim]({})[/]",
                outcome.interface, outcome.step, e
            )),
        }
    }

    fn print_packets(&self, packets: &[Packet]) {
        for packet in packets {
            self.console.print(&format!(
                "    [#3498db]→[/] [#7f8c8d]{}[/]  [dim]({})[/]",
                packet.short_hex(),
                packet::describe(packet)
            ));
        }
    }

    fn print_plan(&self, plan: &[(Button, KeyAction)]) {
        let mut table = Table::new()
            .box_style(&ROUNDED)
            .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
            .border_style(Style::parse("#3498db").unwrap_or_default())
            .with_column(Column::new("Control"))
            .with_column(Column::new("Action"))
            .with_column(Column::new("Modifier"))
            .with_column(Column::new("Key Code"));

        for (button, action) in plan {
            let modifier = format!("0x{:02X}", action.modifiers);
            let key = format!("0x{:02X}", action.keycode);
            table.add_row_cells([
                markup::render_or_plain(button.name()),
                markup::render_or_plain(&action.to_string()),
                markup::render_or_plain(&modifier),
                markup::render_or_plain(&key),
            ]);
        }

        self.console.print_renderable(&table);
        self.console.print("");
    }

    fn info(&self) -> Result<()> {
        self.print_banner();
        let result = probe::probe_device(self.config.vendor_id, self.config.product_id);

        if !result.device_found {
            self.console.print(
                "  [bold #e74c3c]✗[/] [bold white]NO DEVICE FOUND[/]",
            );
            if let Some(e) = result.usb_error.as_ref().or(result.hid_error.as_ref()) {
                self.console.print(&format!("  [dim]{}[/]", e));
            }
            self.console
                .print("  [#95a5a6]Make sure the keyboard is connected via USB.[/]");
            self.console.print("");
            return Ok(());
        }

        self.console
            .print("  [bold #f39c12]⚡[/] [bold white]DEVICE DETECTED[/]");
        self.console.print("");

        if !result.hid_interfaces.is_empty() {
            let mut table = Table::new()
                .box_style(&ROUNDED)
                .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
                .border_style(Style::parse("#3498db").unwrap_or_default())
                .with_column(Column::new("Interface"))
                .with_column(Column::new("Usage"))
                .with_column(Column::new("Product"));

            for hid in &result.hid_interfaces {
                let usage = format!("0x{:04X}:0x{:04X}", hid.usage_page, hid.usage);
                table.add_row_cells([
                    markup::render_or_plain(&hid.interface_number.to_string()),
                    markup::render_or_plain(&usage),
                    markup::render_or_plain(hid.product.as_deref().unwrap_or("N/A")),
                ]);
            }
            self.console.print_renderable(&table);
            if let Some(first) = result.hid_interfaces.first() {
                self.console
                    .print(&format!("  [dim]Path:[/] [#95a5a6]{}[/]", first.path));
            }
            self.console.print("");
        }

        self.console
            .print("  [bold #9b59b6]Endpoint Information:[/]");
        for iface in &result.usb_interfaces {
            self.console.print(&format!(
                "    [dim]Interface {}:[/] class={}",
                iface.number, iface.class_code
            ));
            for ep in &iface.endpoints {
                self.console.print(&format!(
                    "      [#7f8c8d]Endpoint 0x{:02X}:[/] {} {} [dim](max: {})[/]",
                    ep.address,
                    probe::direction_label(ep.direction),
                    probe::transfer_label(ep.transfer_type),
                    ep.max_packet_size
                ));
            }
        }
        if let Some(e) = &result.usb_error {
            self.console
                .print(&format!("    [bold #f39c12]⚠[/] libusb: {}", e));
        }
        self.console.print("");
        Ok(())
    }

    fn list_keys(&self) {
        let mut table = Table::new()
            .box_style(&ROUNDED)
            .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
            .border_style(Style::parse("#3498db").unwrap_or_default())
            .with_column(Column::new("Key"))
            .with_column(Column::new("Code"));
        for (name, code) in usb_hid::key_names() {
            table.add_row_cells([
                markup::render_or_plain(name),
                markup::render_or_plain(&format!("0x{:02X}", code)),
            ]);
        }
        self.console.print_renderable(&table);
        self.console.print("");

        let mut mods = Table::new()
            .box_style(&ROUNDED)
            .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
            .border_style(Style::parse("#3498db").unwrap_or_default())
            .with_column(Column::new("Modifier"))
            .with_column(Column::new("Bit"));
        for (name, bit) in usb_hid::modifier_table() {
            mods.add_row_cells([
                markup::render_or_plain(name),
                markup::render_or_plain(&format!("0x{:02X}", bit)),
            ]);
        }
        self.console.print_renderable(&mods);
        self.console
            .print("  [#95a5a6]Actions: modifiers joined by '-', key last, e.g.[/] [bold]ctrl-shift-f13[/]");
        self.console.print("");
    }

    #[allow(clippy::too_many_arguments)]
    fn program(
        &self,
        flags: [(Button, Option<String>); 9],
        default: bool,
        profile_path: Option<&Path>,
        save: bool,
        dry_run: bool,
        auto_monitor: bool,
    ) -> Result<()> {
        let mut profile = if default {
            Profile::defaults()
        } else if let Some(path) = profile_path {
            Profile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?
        } else {
            Profile::default()
        };

        let mut plan: BTreeMap<Button, KeyAction> = profile.assignments().into_iter().collect();
        for (button, value) in flags {
            if let Some(text) = value {
                let action = parse_cli_action(button, &text)?;
                plan.insert(button, action);
                profile.set(button, action.to_string());
            }
        }

        if plan.is_empty() {
            bail!("Nothing to program: pass --button1..--knob-right, --default or --profile");
        }
        let plan: Vec<(Button, KeyAction)> = plan.into_iter().collect();

        self.print_banner();
        self.console
            .print("  [bold #f39c12]Configuration to program:[/]");
        self.console.print("");
        self.print_plan(&plan);

        if save {
            let path = profile::default_path()
                .ok_or_else(|| anyhow!("Cannot determine home directory for the profile"))?;
            profile
                .save(&path)
                .with_context(|| format!("Failed to save profile to {}", path.display()))?;
            self.console.print(&format!(
                "  [bold #2ecc71]✓[/] Profile saved to [#95a5a6]{}[/]",
                path.display()
            ));
            self.console.print("");
        }

        if dry_run {
            return self.dry_run(&plan);
        }

        let mut session = self.connect()?;
        let result = self.program_session(&mut session, &plan);
        if result.is_ok() && auto_monitor {
            self.console
                .print("  [bold #9b59b6]Starting monitor mode[/] [dim](test your keys, Ctrl+C to stop)[/]");
            self.console.print("");
            let monitored = self.monitor_session(&session, 0, StateScope::default());
            self.disconnect(&mut session);
            return monitored;
        }
        self.disconnect(&mut session);
        result
    }

    fn dry_run(&self, plan: &[(Button, KeyAction)]) -> Result<()> {
        self.console
            .print("  [bold #f39c12]⚠[/]  [bold white]DRY RUN - No changes will be made[/]");
        self.console.print("");
        let mut recorder = PacketRecorder::new();
        for &(button, action) in plan {
            recorder.set_key(button, action)?;
        }
        self.console
            .print("  [#95a5a6]Would send the following packets:[/]");
        self.print_packets(&recorder.packets);
        self.console.print("");
        Ok(())
    }

    fn program_session<P: KeyProgrammer>(
        &self,
        programmer: &mut P,
        plan: &[(Button, KeyAction)],
    ) -> Result<()> {
        self.console.print(RULE);
        for &(button, action) in plan {
            programmer
                .set_key(button, action)
                .with_context(|| format!("Failed to program {}", button))?;
            self.console.print(&format!(
                "  [bold #2ecc71]✓[/] [bold white]{}[/] → {}",
                button, action
            ));
        }
        self.console.print(RULE);
        self.console
            .print("  [bold #2ecc71]PROGRAMMING COMPLETE![/]");
        self.console.print("");
        Ok(())
    }

    fn apply(&self, path: &Path, layer: usize, dry_run: bool) -> Result<()> {
        let mapping = mapping::load(path)
            .with_context(|| format!("Failed to read mapping {}", path.display()))?;

        self.print_banner();
        self.print_issues(&mapping);

        let mut recorder = PacketRecorder::new();
        let plan = mapping::apply_layer(&mut recorder, &mapping, layer)?;
        self.print_plan(&plan);

        if dry_run {
            self.console
                .print("  [bold #f39c12]⚠[/]  [bold white]DRY RUN - No changes will be made[/]");
            self.console.print("");
            self.print_packets(&recorder.packets);
            self.console.print("");
            return Ok(());
        }

        let mut session = self.connect()?;
        let result = self.program_session(&mut session, &plan);
        self.disconnect(&mut session);
        result
    }

    fn print_issues(&self, mapping: &mapping::Mapping) {
        for issue in &mapping.issues {
            self.console.print(&format!(
                "  [bold #f39c12]⚠[/] {}: '{}' {} [dim](programmed as no key)[/]",
                issue.location, issue.text, issue.reason
            ));
        }
        if !mapping.issues.is_empty() {
            self.console.print("");
        }
    }

    fn check(&self, path: &Path) -> Result<()> {
        let mapping = mapping::load(path)
            .with_context(|| format!("Failed to read mapping {}", path.display()))?;
        self.print_issues(&mapping);
        self.console.print(&format!(
            "  [bold #2ecc71]✓[/] {} layer(s), {}x{} grid, {} knob(s), {} issue(s)",
            mapping.layers.len(),
            mapping.rows,
            mapping.columns,
            mapping.knobs,
            mapping.issues.len()
        ));
        self.console.print("");
        // Plain stdout: the YAML must not go through markup rendering.
        print!("{}", mapping::export(&mapping)?);
        Ok(())
    }

    fn led(
        &self,
        mode: Option<u8>,
        encoder: Option<&str>,
        all: bool,
        list: bool,
        dry_run: bool,
    ) -> Result<()> {
        if list {
            let mut table = Table::new()
                .box_style(&ROUNDED)
                .header_style(Style::parse("bold #f1c40f").unwrap_or_default())
                .border_style(Style::parse("#3498db").unwrap_or_default())
                .with_column(Column::new("Encoder"))
                .with_column(Column::new("Layout"));
            for encoder in led::LED_ENCODERS {
                table.add_row_cells([
                    markup::render_or_plain(encoder.name),
                    markup::render_or_plain(encoder.description),
                ]);
            }
            self.console.print_renderable(&table);
            self.console
                .print("  [#95a5a6]None of these layouts is confirmed; watch the LEDs.[/]");
            self.console.print("");
            return Ok(());
        }

        let mode = mode.ok_or_else(|| anyhow!("--mode is required"))?;
        let encoders: Vec<&LedEncoder> = if all {
            led::LED_ENCODERS.iter().collect()
        } else if let Some(name) = encoder {
            vec![led::find_encoder(name)
                .ok_or_else(|| anyhow!("Unknown LED encoder: {} (see led --list)", name))?]
        } else {
            vec![led::default_encoder()]
        };

        if dry_run {
            for encoder in &encoders {
                self.console.print(&format!(
                    "  [bold #f1c40f]▸[/] {} [dim]mode 0x{:02X}[/]",
                    encoder.name, mode
                ));
                self.print_packets(&encoder.packets(mode));
            }
            self.console.print("");
            return Ok(());
        }

        self.print_banner();
        let mut session = self.connect()?;
        let mut result = Ok(());
        for (i, encoder) in encoders.iter().enumerate() {
            if i > 0 {
                // Give the operator time to see what changed.
                std::thread::sleep(Duration::from_millis(1500));
            }
            match session.set_led_mode_with(encoder, mode) {
                Ok(packets) => {
                    self.console.print(&format!(
                        "  [bold #f1c40f]▸[/] Sent [bold]{}[/] [dim]mode 0x{:02X}[/]",
                        encoder.name, mode
                    ));
                    self.print_packets(&packets);
                }
                Err(e) => {
                    result =
                        Err(anyhow!(e).context(format!("LED encoder {} failed", encoder.name)));
                    break;
                }
            }
        }
        self.disconnect(&mut session);
        self.console.print("");
        result
    }

    fn raw(&self, data: &str, dry_run: bool) -> Result<()> {
        let bytes = hex::decode(data.trim()).context("Invalid hex data")?;
        if bytes.is_empty() {
            bail!("Raw frame cannot be empty");
        }
        if bytes.len() > PACKET_LEN {
            bail!(
                "Raw frame of {} bytes exceeds maximum of {} bytes",
                bytes.len(),
                PACKET_LEN
            );
        }
        let packet = Packet::encode(&bytes)?;

        if dry_run {
            self.print_packets(&[packet]);
            return Ok(());
        }

        let mut session = self.connect()?;
        let result = session.send_raw(&bytes).map_err(anyhow::Error::from);
        if let Ok(sent) = &result {
            self.console.print("  [bold #2ecc71]✓[/] Sent:");
            self.print_packets(&[*sent]);
        }
        self.disconnect(&mut session);
        result.map(|_| ())
    }

    fn monitor(&self, duration_secs: u64, scope: StateScope) -> Result<()> {
        self.print_banner();
        let mut session = self.connect()?;
        let result = self.monitor_session(&session, duration_secs, scope);
        self.disconnect(&mut session);
        result
    }

    fn monitor_session(
        &self,
        session: &DeviceSession<RusbBackend>,
        duration_secs: u64,
        scope: StateScope,
    ) -> Result<()> {
        self.console.print(
            "  [bold #9b59b6]👁[/]  [bold white]LIVE MONITOR MODE[/] [#95a5a6]press keys or turn the knob[/]",
        );
        self.console
            .print("  [#95a5a6]Press[/] [bold #e74c3c]Ctrl+C[/] [#95a5a6]to stop.[/]");
        if duration_secs > 0 {
            self.console.print(&format!(
                "  [#95a5a6]Auto-stop in[/] [bold #f39c12]{}[/] [#95a5a6]seconds.[/]",
                duration_secs
            ));
        }
        self.console.print(RULE);

        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("Failed to install Ctrl+C handler")?;

        let (tx, rx) = crossbeam::channel::unbounded();
        let options = MonitorOptions {
            scope,
            ..MonitorOptions::default()
        };
        let mut monitor = session.start_monitor(options, move |event| {
            let _ = tx.send(event);
        })?;

        let start = Instant::now();
        loop {
            if interrupted.load(Ordering::SeqCst) {
                break;
            }
            if duration_secs > 0 && start.elapsed().as_secs() >= duration_secs {
                break;
            }
            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => self.print_event(&event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        monitor.stop();
        self.console.print(RULE);
        self.console
            .print("[bold #2ecc71]✓[/] [#95a5a6]Monitoring complete.[/]");
        self.console.print("");
        Ok(())
    }

    fn print_event(&self, event: &MonitorEvent) {
        let ts = chrono::Local::now().format("%H:%M:%S%.3f");
        match event {
            MonitorEvent::Press {
                endpoint,
                keycode,
                key_name,
                modifier_label,
                ..
            } => {
                let key = key_name.map_or_else(|| format!("0x{:02X}", keycode), str::to_string);
                let combo = if modifier_label.is_empty() {
                    key
                } else {
                    format!("{}-{}", modifier_label, key)
                };
                self.console.print(&format!(
                    "  [dim]{}[/] [bold #2ecc71]▶[/] [bold #f1c40f]PRESS[/]   [bold white]{}[/]  [dim #7f8c8d](ep 0x{:02X}, code 0x{:02X})[/]",
                    ts, combo, endpoint, keycode
                ));
            }
            MonitorEvent::Release {
                endpoint,
                keycode,
                key_name,
            } => {
                let key = key_name.map_or_else(|| format!("0x{:02X}", keycode), str::to_string);
                self.console.print(&format!(
                    "  [dim]{}[/] [dim #e74c3c]◀[/] [dim #95a5a6]RELEASE[/] {}  [dim #7f8c8d](ep 0x{:02X})[/]",
                    ts, key, endpoint
                ));
            }
            MonitorEvent::Error { message } => {
                self.console.print(&format!(
                    "  [dim]{}[/] [bold #e74c3c]✗[/] [#e74c3c]Read error:[/] {}",
                    ts, message
                ));
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("minikb={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app = MiniKb::new(DeviceConfig::with_ids(cli.vid, cli.pid));

    match cli.command {
        Commands::Info => {
            app.info()?;
        }
        Commands::ListKeys => {
            app.list_keys();
        }
        Commands::Program {
            button1,
            button2,
            button3,
            button4,
            button5,
            button6,
            knob_left,
            knob_press,
            knob_right,
            default,
            profile,
            save,
            dry_run,
            monitor,
        } => {
            let flags = [
                (Button::Key1, button1),
                (Button::Key2, button2),
                (Button::Key3, button3),
                (Button::Key4, button4),
                (Button::Key5, button5),
                (Button::Key6, button6),
                (Button::KnobCcw, knob_left),
                (Button::KnobPress, knob_press),
                (Button::KnobCw, knob_right),
            ];
            app.program(flags, default, profile.as_deref(), save, dry_run, monitor)?;
        }
        Commands::Apply {
            mapping,
            layer,
            dry_run,
        } => {
            app.apply(&mapping, layer, dry_run)?;
        }
        Commands::Check { mapping } => {
            app.check(&mapping)?;
        }
        Commands::Led {
            mode,
            encoder,
            all,
            list,
            dry_run,
        } => {
            app.led(mode, encoder.as_deref(), all, list, dry_run)?;
        }
        Commands::Monitor {
            duration,
            shared_state,
        } => {
            let scope = if shared_state {
                StateScope::Shared
            } else {
                StateScope::PerEndpoint
            };
            app.monitor(duration, scope)?;
        }
        Commands::Raw { data, dry_run } => {
            app.raw(&data, dry_run)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "minikb", &mut std::io::stdout());
        }
    }

    Ok(())
}
