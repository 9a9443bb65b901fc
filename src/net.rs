//! Wi-Fi bring-up: join the configured network as a station while hosting a
//! WPA2 access point, and hand out DHCP leases on the AP side.

use alloc::string::String;
use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Ipv4Cidr, Runner, Stack, StackResources, StaticConfigV4};
use embassy_time::Timer;
use esp_hal::{peripherals::WIFI, rng::Rng};
use esp_radio::{
    Controller as RadioController,
    wifi::{ApConfig, AuthMethod, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent},
};
use static_cell::StaticCell;

use crate::config::{
    AP_GATEWAY, AP_PASSWORD, AP_SSID, STA_JOIN_ATTEMPTS, STA_PASSWORD, STA_SSID,
};

static RADIO_CONTROLLER: StaticCell<RadioController<'static>> = StaticCell::new();
static STA_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static AP_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

/// Initialize the radio in mixed AP+STA mode and spawn the network tasks.
/// Returns the (station, access point) stacks for the HTTP server.
pub fn init(
    spawner: &Spawner,
    wifi_peripheral: WIFI<'static>,
) -> Result<(Stack<'static>, Stack<'static>), &'static str> {
    let radio = RADIO_CONTROLLER
        .init(esp_radio::init().map_err(|_| "Failed to initialize radio controller")?);

    let (mut controller, interfaces) =
        esp_radio::wifi::new(radio, wifi_peripheral, Default::default())
            .map_err(|_| "Failed to initialize Wi-Fi driver")?;

    let client_config = ClientConfig::default()
        .with_ssid(String::from(STA_SSID))
        .with_password(String::from(STA_PASSWORD));
    let ap_config = ApConfig::default()
        .with_ssid(String::from(AP_SSID))
        .with_password(String::from(AP_PASSWORD))
        .with_auth_method(AuthMethod::Wpa2Personal);

    controller
        .set_config(&ModeConfig::ApSta(client_config, ap_config))
        .map_err(|_| "Failed to set Wi-Fi mode config")?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let (sta_stack, sta_runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::new()),
        seed,
    );

    let ap_net_config = NetConfig::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(AP_GATEWAY, 24),
        gateway: Some(AP_GATEWAY),
        dns_servers: Default::default(),
    });
    let (ap_stack, ap_runner) = embassy_net::new(
        interfaces.ap,
        ap_net_config,
        AP_RESOURCES.init(StackResources::new()),
        seed.wrapping_add(1),
    );

    spawner
        .spawn(net_task(sta_runner))
        .map_err(|_| "Failed to spawn station net task")?;
    spawner
        .spawn(net_task(ap_runner))
        .map_err(|_| "Failed to spawn AP net task")?;
    spawner
        .spawn(wifi_connection(controller))
        .map_err(|_| "Failed to spawn Wi-Fi connection task")?;
    spawner
        .spawn(dhcp_server(ap_stack))
        .map_err(|_| "Failed to spawn DHCP server task")?;

    esp_println::println!("[WIFI] Access point \"{}\" at {}", AP_SSID, AP_GATEWAY);

    Ok((sta_stack, ap_stack))
}

/// Wait for the station to join and obtain an address: up to
/// `STA_JOIN_ATTEMPTS` checks, one second apart. A failed join is logged and
/// the firmware carries on reachable through the access point only.
pub async fn wait_for_station(stack: Stack<'static>) -> bool {
    for _ in 0..STA_JOIN_ATTEMPTS {
        if let Some(cfg) = stack.config_v4() {
            esp_println::println!("[WIFI] Station IP: {}", cfg.address.address());
            return true;
        }
        Timer::after_secs(1).await;
    }

    esp_println::println!("[WIFI] Failed to join \"{}\", AP only", STA_SSID);
    false
}

#[embassy_executor::task(pool_size = 2)]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[embassy_executor::task]
async fn wifi_connection(mut controller: WifiController<'static>) {
    if let Err(e) = controller.start_async().await {
        esp_println::println!("[WIFI] Start failed: {:?}", e);
        return;
    }
    esp_println::println!("[WIFI] Radio started, connecting to \"{}\"", STA_SSID);

    match controller.connect_async().await {
        Ok(()) => esp_println::println!("[WIFI] Connected to \"{}\"", STA_SSID),
        Err(e) => esp_println::println!("[WIFI] Join failed: {:?}", e),
    }

    // No reconnect policy: log link loss and stay up for the access point.
    loop {
        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        esp_println::println!("[WIFI] Station disconnected");
    }
}

#[embassy_executor::task]
async fn dhcp_server(stack: Stack<'static>) {
    use edge_dhcp::{
        io::{self, DEFAULT_SERVER_PORT},
        server::{Server, ServerOptions},
    };
    use edge_nal::UdpBind;
    use edge_nal_embassy::{Udp, UdpBuffers};

    let mut buf = [0u8; 1500];
    let mut gw_buf = [Ipv4Addr::UNSPECIFIED];

    let buffers = UdpBuffers::<2, 1024, 1024, 4>::new();
    let unbound = Udp::new(stack, &buffers);
    let mut socket = match unbound
        .bind(SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::UNSPECIFIED,
            DEFAULT_SERVER_PORT,
        )))
        .await
    {
        Ok(s) => s,
        Err(e) => {
            esp_println::println!("[DHCP] Bind failed: {:?}", e);
            return;
        }
    };

    // Keep the server alive across restarts so leases survive transient
    // socket errors.
    let mut server = Server::<_, 8>::new_with_et(AP_GATEWAY);
    let options = ServerOptions::new(AP_GATEWAY, Some(&mut gw_buf));

    esp_println::println!("[DHCP] Server listening on AP interface");
    loop {
        let _ = io::server::run(&mut server, &options, &mut socket, &mut buf)
            .await
            .inspect_err(|e| esp_println::println!("[DHCP] Server error: {:?}", e));
        Timer::after_millis(500).await;
    }
}
