#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Neither the config nor the profile settings parser may panic; a
    // parsed config must survive validation and seeding a profile.
    if let Ok(cfg) = mountcal_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        let _ = mountcal_config::ProfileSettings::from_config(&cfg);
    }
    let _ = toml::from_str::<mountcal_config::ProfileSettings>(data);
});
