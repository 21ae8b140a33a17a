use memreg::{
    BitRegister, CacheConfig, Declaration, FieldSpec, LayoutCache, MemStore, Record, Register, RegisterError,
    shared,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const HEADER_DECLARATION: &str = r#"{
  "name": "HEADER",
  "start_offset": 0,
  "span": 16,
  "fields": [
    ["INITD", 1, true],
    ["MNT", 1, true],
    ["TYPE", 5],
    ["DATE", 1, "H"],
    ["SAC", 3]
  ]
}"#;

fn main() -> Result<(), RegisterError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // `memreg <cache.json>` persists layouts there; default is memcache.json
    let mut config = CacheConfig::default();
    if let Some(path) = std::env::args().nth(1) {
        config.path = Some(path.into());
    }
    let mut cache = LayoutCache::from_config(&config);
    let ram = shared(MemStore::new(24));

    let mut header = Declaration::from_json(HEADER_DECLARATION)?.open(ram.clone(), &mut cache)?;
    header.set("INITD", true)?;
    header.set("TYPE", "boot")?;
    header.set("DATE", 0x2410u16)?;
    header.set("SAC", &[1u8, 2, 3])?;
    header.commit()?;

    let mut register = Record::new(
        "REGISTER",
        ram.clone(),
        16,
        4,
        &[FieldSpec::bit("START", 1), FieldSpec::bit("STATUS", 1)],
        &mut cache,
    )?;
    register.toggle("STATUS")?;
    register.commit()?;

    let mut ctrl = BitRegister::new(
        "CTRL",
        ram.clone(),
        20,
        16,
        &[("EN", 0, 1).into(), ("PRESCALE", 8, 4).into()],
        &mut cache,
    )?;
    ctrl.set("EN", true)?;
    ctrl.set("PRESCALE", 9u8)?;
    ctrl.commit()?;

    info!(
        header = %header.layout_source(),
        register = %register.layout_source(),
        ctrl = %ctrl.layout_source(),
        "layouts ready"
    );
    print!("{header}");
    print!("{register}");
    print!("{ctrl}");
    println!("memory: {:02x?}", ram.borrow().as_bytes());
    Ok(())
}
