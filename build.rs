fn main() {
    println!("cargo:rerun-if-env-changed=PRESSUREGUARD_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=PRESSUREGUARD_WIFI_PASS");
    println!("cargo:rerun-if-env-changed=PRESSUREGUARD_BACKEND_URL");

    // ESP-IDF link arguments are only needed for the firmware image.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
