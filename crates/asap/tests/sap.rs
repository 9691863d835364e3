//! Loading SAP files through the public API.

use std::io::Write;

use asap::{
    Asap, AsapError, ModuleInfo, ModuleType, SampleFormat, can_set_module_info, change_ext,
    header_for, is_our_file, module_info, set_module_info,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const HEADER: &str = "SAP\r\n\
AUTHOR \"Adam Bienias (SoTe)\"\r\n\
NAME \"Bitter Reality\"\r\n\
DATE \"1993\"\r\n\
SONGS 2\r\n\
TYPE B\r\n\
INIT 2000\r\n\
PLAYER 2003\r\n\
TIME 02:30.25\r\n\
TIME 00:07 LOOP\r\n";

/// INIT and PLAYER at $2000: three RTS.
const BODY: [u8; 9] = [0xFF, 0xFF, 0x00, 0x20, 0x02, 0x20, 0x60, 0x60, 0x60];

fn module() -> Vec<u8> {
    let mut module = HEADER.as_bytes().to_vec();
    module.extend_from_slice(&BODY);
    module
}

#[test]
fn metadata_without_loading() {
    let info = module_info("music/Bitter_Reality.sap", &module()).expect("parse");
    assert_eq!(info.author, "Adam Bienias (SoTe)");
    assert_eq!(info.name, "Bitter Reality");
    assert_eq!(info.date, "1993");
    assert_eq!(info.songs, 2);
    assert_eq!(info.module_type, ModuleType::SapB);
    assert_eq!(info.duration(0), Some(150_250));
    assert!(info.is_loop(1));
    assert_eq!(info.header_len, HEADER.len());
}

#[test]
fn name_defaults_to_file_name() {
    let header = "SAP\r\nTYPE B\r\nINIT 2000\r\nPLAYER 2003\r\n";
    let mut module = header.as_bytes().to_vec();
    module.extend_from_slice(&BODY);
    let info = module_info(r"C:\Atari\Lasermania.SAP", &module).expect("parse");
    assert_eq!(info.name, "Lasermania");
    assert_eq!(info.channels, 1);
    assert_eq!(info.fastplay, 312);
}

#[test]
fn load_errors() {
    let mut asap = Asap::new();
    assert!(matches!(
        asap.load("song.rmt", &module()),
        Err(AsapError::UnsupportedFormat(_))
    ));

    // Block claims $2000-$2010 but carries three bytes
    let mut truncated = HEADER.as_bytes().to_vec();
    truncated.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x20, 0x10, 0x20, 0x60, 0x60, 0x60]);
    assert!(matches!(
        asap.load("song.sap", &truncated),
        Err(AsapError::InvalidBlock { .. })
    ));

    assert!(matches!(
        asap.load("song.sap", b"SAP\r\nTYPE Q\r\n\xFF\xFF\0\x20\0\x20\x60\0\0"),
        Err(AsapError::InvalidHeader(_))
    ));
}

#[test]
fn load_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".sap")
        .tempfile()
        .expect("temp file");
    file.write_all(&module()).expect("write");

    let mut asap = Asap::new();
    asap.load_file(file.path()).expect("load");
    assert_eq!(asap.module_info().name, "Bitter Reality");
    asap.play_song(1, None).expect("play");
    assert_eq!(asap.current_song(), 1);

    let missing = file.path().with_extension("missing.sap");
    assert!(matches!(asap.load_file(&missing), Err(AsapError::Io(_))));
}

#[test]
fn edited_metadata_survives_a_reload() {
    let original = module();
    let mut info = module_info("a.sap", &original).expect("parse");
    info.author = "Someone Else".to_string();
    info.durations[0] = Some(61_000);
    info.loops[0] = true;

    let edited = set_module_info(&info, &original).expect("rewrite");
    assert!(edited.ends_with(&BODY));

    let mut asap = Asap::new();
    asap.load("a.sap", &edited).expect("load edited");
    let reloaded = asap.module_info();
    assert_eq!(reloaded.author, "Someone Else");
    assert_eq!(reloaded.duration(0), Some(61_000));
    assert!(reloaded.is_loop(0));
    assert_eq!(reloaded.init, Some(0x2000), "untouched tags are kept");
}

#[test]
fn file_names() {
    assert!(is_our_file("x/y/Song.Sap"));
    assert!(!is_our_file("song.sap.txt"));
    assert!(can_set_module_info("song.SAP"));
    assert_eq!(
        change_ext("out/song.sap", "wav").as_deref(),
        Some("out/song.wav")
    );
}

#[test]
fn random_code_never_panics() {
    let mut rng = StdRng::seed_from_u64(1979);
    let mut info = ModuleInfo::new("noise");
    info.init = Some(0x2000);
    info.player = Some(0x2800);
    info.channels = 2;
    let header = header_for(&info).expect("header");

    for _ in 0..8 {
        let mut module = header.clone();
        module.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x20, 0xFF, 0x2F]);
        module.extend((0..0x1000).map(|_| rng.random::<u8>()));

        let mut asap = Asap::new();
        asap.load("noise.sap", &module).expect("load");
        asap.play_song(0, Some(200)).expect("play");
        let mut buffer = vec![0u8; 4 * 10_000];
        let n = asap.generate(&mut buffer, SampleFormat::S16Le);
        assert_eq!(n, 4 * 8820);
    }
}
