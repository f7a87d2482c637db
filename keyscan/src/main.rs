mod config;

use std::path::Path;
use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use eyre::eyre;
use log::{debug, info, warn};
use sysinfo::System;
use keyscan_gpio::axi::port::AxiKeypadPort;
use keyscan_gpio::axi::uio::UioInterrupt;
use keyscan_gpio::axi::{AxiChannel, AxiGpio};
use keyscan_gpio::irq::{IrqTable, KeypadInterruptHandler, Latch, OutputSink, NO_KEY_OUTPUT};
use keyscan_gpio::keypad::{KeyCode, Keypad, MatrixKeypad};
use crate::config::{Config, ScanMode};

fn log_system() {
    const UNKNOWN_STR: &str = "???";

    info!(
        "Running on {} ({}), kernel {}",
        System::name().as_deref().unwrap_or(UNKNOWN_STR),
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!("Architecture {}", System::cpu_arch());
}

fn load_config(config_path: &Path) -> eyre::Result<Config> {
    debug!("Trying to load config from {}...", config_path.display());
    if let Some(config) = Config::try_load(config_path)? {
        info!("Config loaded.");
        Ok(config)
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save(config_path)?;
        info!("Default config saved.");
        Ok(config)
    }
}

fn parse_channels(config: &Config) -> eyre::Result<(AxiChannel, AxiChannel)> {
    let keypad = AxiChannel::try_from(config.keypad_channel)
        .map_err(|_| eyre!("Invalid keypad channel {}", config.keypad_channel))?;
    let leds = AxiChannel::try_from(config.led_channel)
        .map_err(|_| eyre!("Invalid LED channel {}", config.led_channel))?;
    if keypad == leds {
        return Err(eyre!("Keypad and LEDs can't share channel {:?}", keypad));
    }
    Ok((keypad, leds))
}

fn run_interrupt<'a>(
    config: &Config,
    gpio: &AxiGpio,
    port: &'a AxiKeypadPort<'a>,
    keypad: MatrixKeypad<'a>,
) -> eyre::Result<()> {
    let handler = KeypadInterruptHandler::new(keypad, port, port, port.keypad_mask())
        .with_spurious_rearm(config.rearm_on_spurious);
    debug!("{:?} initialized.", handler);

    let mut uio = UioInterrupt::open(config.interrupt_device())?;
    debug!("{:?} initialized.", uio);

    let mut irqs = IrqTable::new();
    irqs.connect(config.interrupt_id, &handler)?;
    handler.arm();
    gpio.interrupt_global_enable();
    irqs.enable(config.interrupt_id)?;
    irqs.global_enable();

    info!("Waiting for keypad interrupts on IRQ {}...", config.interrupt_id);

    let mut last = handler.latched();
    let mut warned = false;
    loop {
        if !handler.is_armed() && !warned {
            warn!("Keypad interrupt is disabled, no more key presses will be reported.");
            warned = true;
        }

        uio.unmask()?;
        let count = uio.wait()?;
        debug!("Interrupt #{}", count);
        irqs.dispatch(config.interrupt_id);

        let latched = handler.latched();
        if latched != last {
            match latched {
                Latch::Key(key) => info!("Key {} pressed", key),
                Latch::NoKey => info!("No key pressed"),
                Latch::Unwritten => {}
            }
            last = latched;
        }
    }
}

fn run_poll(config: &Config, gpio: &AxiGpio, port: &AxiKeypadPort, keypad: &MatrixKeypad) -> eyre::Result<()> {
    gpio.interrupt_disable(port.keypad_mask());
    gpio.interrupt_global_disable();

    let interval = Duration::from_millis(config.poll_interval_ms);
    info!("Polling keypad every {:?}...", interval);

    let mut last = None;
    loop {
        let key = keypad.scan();
        port.write_output(key.map_or(NO_KEY_OUTPUT, KeyCode::value));

        if key != last {
            match key {
                Some(key) => info!("Key {} pressed", key),
                None => debug!("Key released"),
            }
            last = key;
        }

        thread::sleep(interval);
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("KeyScan starting...");
    log_system();

    let config = load_config(&Config::path())?;
    let (keypad_channel, led_channel) = parse_channels(&config)?;

    info!("AXI GPIO @ {}, keypad: {:?}, LEDs: {:?}, mode: {:?}",
        config.device, keypad_channel, led_channel, config.mode);

    debug!("Initializing GPIO driver...");
    let gpio = AxiGpio::open_uio(&config.device)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing keypad driver...");
    let port = AxiKeypadPort::new(&gpio, keypad_channel, led_channel);
    port.configure();
    let keypad = MatrixKeypad::new(&port);
    debug!("{:?} initialized.", keypad);

    info!("KeyScan initialized.");

    match config.mode {
        ScanMode::Interrupt => run_interrupt(&config, &gpio, &port, keypad),
        ScanMode::Poll => run_poll(&config, &gpio, &port, &keypad),
    }
}
