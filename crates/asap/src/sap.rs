//! SAP file format: a text header of tags followed by Atari DOS binary
//! blocks.
//!
//! ```text
//! SAP<CR><LF>
//! AUTHOR "Rob Hubbard"<CR><LF>
//! TYPE B<CR><LF>
//! INIT 1000<CR><LF>
//! PLAYER 1003<CR><LF>
//! $FF $FF start-lo start-hi end-lo end-hi data... [$FF $FF] start end data...
//! ```

use log::debug;

use crate::duration::{duration_to_string, parse_duration};
use crate::error::{AsapError, Result};
use crate::filename;
use crate::module_info::{DEFAULT_FASTPLAY, ModuleInfo, ModuleType, SONGS_MAX};

/// Longest header line, excluding CR LF.
const MAX_LINE: usize = 254;

/// Longest AUTHOR, NAME or DATE value.
const MAX_TEXT: usize = 127;

/// Frame length forced by type S players.
const TYPE_S_FASTPLAY: u32 = 78;

/// Tags rewritten by [`set_module_info`]; everything else is copied.
const EDITABLE_TAGS: [&[u8]; 7] = [
    b"AUTHOR ",
    b"NAME ",
    b"DATE ",
    b"SONGS ",
    b"DEFSONG ",
    b"STEREO",
    b"TIME ",
];

fn invalid(msg: impl Into<String>) -> AsapError {
    AsapError::InvalidHeader(msg.into())
}

fn parse_hex(tag: &str, arg: &str) -> Result<u16> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid(format!("{tag}: bad hex value {arg:?}")));
    }
    u32::from_str_radix(arg, 16)
        .ok()
        .and_then(|v| u16::try_from(v).ok())
        .ok_or_else(|| invalid(format!("{tag}: {arg} out of range")))
}

fn parse_dec(tag: &str, arg: &str, min: usize, max: usize) -> Result<usize> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("{tag}: bad number {arg:?}")));
    }
    arg.parse::<usize>()
        .ok()
        .filter(|v| (min..=max).contains(v))
        .ok_or_else(|| invalid(format!("{tag}: {arg} not in {min}..={max}")))
}

/// Quoted text. `"<?>"` means unknown and yields `None`.
fn parse_text(tag: &str, arg: &str) -> Result<Option<String>> {
    let quoted = arg
        .strip_prefix('"')
        .ok_or_else(|| invalid(format!("{tag}: value not quoted")))?;
    if quoted.starts_with("<?>\"") {
        return Ok(None);
    }
    let end = quoted
        .find('"')
        .ok_or_else(|| invalid(format!("{tag}: missing closing quote")))?;
    if end > MAX_TEXT {
        return Err(invalid(format!("{tag}: longer than {MAX_TEXT} characters")));
    }
    Ok(Some(quoted[..end].to_string()))
}

/// Parse the header into `info`, leaving `info.header_len` at the first of
/// the two `$FF` bytes that end it.
pub(crate) fn parse_header(info: &mut ModuleInfo, module: &[u8]) -> Result<()> {
    let mut index = 0;
    let mut signature = false;
    let mut type_letter = None;
    let mut duration_index = 0;

    loop {
        if index + 8 >= module.len() {
            return Err(invalid("no binary data after header"));
        }
        if module[index] == 0xFF {
            break;
        }
        let end = module[index..]
            .iter()
            .position(|&b| b == b'\r')
            .map(|p| index + p)
            .ok_or_else(|| invalid("unterminated header line"))?;
        if end - index > MAX_LINE {
            return Err(invalid("header line too long"));
        }
        if module.get(end + 1) != Some(&b'\n') {
            return Err(invalid("header line not terminated by CR LF"));
        }
        let line = String::from_utf8_lossy(&module[index..end]);
        index = end + 2;

        let (tag, arg) = line.split_once(' ').unwrap_or((&*line, ""));
        if tag == "SAP" {
            signature = true;
        }
        if !signature {
            return Err(invalid("missing SAP signature"));
        }
        match tag {
            "AUTHOR" => {
                if let Some(text) = parse_text(tag, arg)? {
                    info.author = text;
                }
            }
            "NAME" => {
                if let Some(text) = parse_text(tag, arg)? {
                    info.name = text;
                }
            }
            "DATE" => {
                if let Some(text) = parse_text(tag, arg)? {
                    info.date = text;
                }
            }
            "SONGS" => info.songs = parse_dec(tag, arg, 1, SONGS_MAX)?,
            "DEFSONG" => info.default_song = parse_dec(tag, arg, 0, SONGS_MAX - 1)?,
            "STEREO" => info.channels = 2,
            "TIME" => {
                if duration_index >= SONGS_MAX {
                    return Err(invalid("too many TIME tags"));
                }
                let duration =
                    parse_duration(arg).ok_or_else(|| AsapError::InvalidDuration(arg.to_string()))?;
                info.durations[duration_index] = Some(duration);
                info.loops[duration_index] = arg.contains("LOOP");
                duration_index += 1;
            }
            "TYPE" => type_letter = arg.bytes().next(),
            "FASTPLAY" => info.fastplay = parse_dec(tag, arg, 1, 312)? as u32,
            "MUSIC" => info.music = Some(parse_hex(tag, arg)?),
            "INIT" => info.init = Some(parse_hex(tag, arg)?),
            "PLAYER" => info.player = Some(parse_hex(tag, arg)?),
            "COVOX" => {
                let addr = parse_hex(tag, arg)?;
                if addr != 0xD600 {
                    return Err(invalid(format!("COVOX at {addr:04X}, only D600 supported")));
                }
                info.covox_addr = Some(addr);
                info.channels = 2;
            }
            _ => {}
        }
    }

    if info.default_song >= info.songs {
        return Err(invalid(format!(
            "DEFSONG {} but only {} songs",
            info.default_song, info.songs
        )));
    }
    let require = |field: Option<u16>, tag: &str| {
        field
            .map(|_| ())
            .ok_or_else(|| invalid(format!("{tag} missing")))
    };
    info.module_type = match type_letter {
        Some(b'B') => {
            require(info.player, "PLAYER")?;
            require(info.init, "INIT")?;
            ModuleType::SapB
        }
        Some(b'C') => {
            require(info.player, "PLAYER")?;
            require(info.music, "MUSIC")?;
            ModuleType::SapC
        }
        Some(b'D') => {
            require(info.player, "PLAYER")?;
            require(info.init, "INIT")?;
            ModuleType::SapD
        }
        Some(b'S') => {
            require(info.init, "INIT")?;
            info.fastplay = TYPE_S_FASTPLAY;
            ModuleType::SapS
        }
        Some(other) => return Err(invalid(format!("unsupported TYPE {}", char::from(other)))),
        None => return Err(invalid("TYPE missing")),
    };
    if module.get(index + 1) != Some(&0xFF) {
        return Err(invalid("header not terminated by $FF $FF"));
    }
    info.header_len = index;
    Ok(())
}

fn word(module: &[u8], index: usize) -> usize {
    usize::from(module[index]) | (usize::from(module[index + 1]) << 8)
}

/// Zero `memory` and copy the binary blocks following the header into it.
pub(crate) fn load_blocks(memory: &mut [u8], module: &[u8], header_len: usize) -> Result<()> {
    memory.fill(0);
    let mut index = header_len + 2;
    while index + 5 <= module.len() {
        let start = word(module, index);
        let end = word(module, index + 2);
        let data = index + 4;
        if end < start || data + (end - start) >= module.len() {
            return Err(AsapError::InvalidBlock { offset: index });
        }
        let len = end + 1 - start;
        memory[start..=end].copy_from_slice(&module[data..data + len]);
        debug!("Block {start:04X}-{end:04X}");
        index = data + len;
        if index == module.len() {
            return Ok(());
        }
        if index + 7 <= module.len() && module[index] == 0xFF && module[index + 1] == 0xFF {
            index += 2;
        }
    }
    Err(AsapError::InvalidBlock { offset: index })
}

/// Parse the metadata of a module without loading it.
///
/// `filename` selects the format by extension and supplies the default
/// name.
pub fn module_info(filename: &str, module: &[u8]) -> Result<ModuleInfo> {
    let (stem, ext) = filename::split(filename)
        .ok_or_else(|| AsapError::UnsupportedFormat(filename.to_string()))?;
    if !filename::is_our_ext(ext) {
        return Err(AsapError::UnsupportedFormat(ext.to_string()));
    }
    let mut info = ModuleInfo::new(stem);
    parse_header(&mut info, module)?;
    Ok(info)
}

fn put_text_tag(out: &mut Vec<u8>, tag: &str, value: &str) -> Result<()> {
    let value = if value.is_empty() { "<?>" } else { value };
    if let Some(c) = value
        .chars()
        .find(|&c| !(' '..='z').contains(&c) || c == '"' || c == '`')
    {
        return Err(invalid(format!("{tag}: character {c:?} not allowed")));
    }
    out.extend_from_slice(format!("{tag} \"{value}\"\r\n").as_bytes());
    Ok(())
}

fn put_dec_tag(out: &mut Vec<u8>, tag: &str, value: usize) {
    out.extend_from_slice(format!("{tag} {value}\r\n").as_bytes());
}

fn start_header(out: &mut Vec<u8>, info: &ModuleInfo) -> Result<()> {
    out.extend_from_slice(b"SAP\r\n");
    put_text_tag(out, "AUTHOR", &info.author)?;
    put_text_tag(out, "NAME", &info.name)?;
    put_text_tag(out, "DATE", &info.date)?;
    if info.songs > 1 {
        put_dec_tag(out, "SONGS", info.songs);
        if info.default_song > 0 {
            put_dec_tag(out, "DEFSONG", info.default_song);
        }
    }
    if info.is_stereo() {
        out.extend_from_slice(b"STEREO\r\n");
    }
    Ok(())
}

/// `TIME` tags for the leading songs with known durations.
fn put_durations(out: &mut Vec<u8>, info: &ModuleInfo) {
    for song in 0..info.songs.min(SONGS_MAX) {
        let Some(duration) = info.durations[song] else {
            break;
        };
        out.extend_from_slice(b"TIME ");
        out.extend_from_slice(duration_to_string(duration).as_bytes());
        if info.loops[song] {
            out.extend_from_slice(b" LOOP");
        }
        out.extend_from_slice(b"\r\n");
    }
}

/// Rewrite the AUTHOR, NAME, DATE, SONGS, DEFSONG, STEREO and TIME tags of
/// a SAP file from `info`. Every other tag and the binary part are kept.
pub fn set_module_info(info: &ModuleInfo, module: &[u8]) -> Result<Vec<u8>> {
    if !module.starts_with(b"SAP\r\n") {
        return Err(invalid("missing SAP signature"));
    }
    let mut out = Vec::with_capacity(module.len() + 256);
    start_header(&mut out, info)?;

    let mut i = 5;
    while i < module.len() && module[i] != 0xFF {
        let line_end = module[i..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(module.len(), |p| i + p + 1);
        let line = &module[i..line_end];
        if !EDITABLE_TAGS.iter().any(|tag| line.starts_with(tag)) {
            out.extend_from_slice(line);
        }
        i = line_end;
    }
    put_durations(&mut out, info);
    out.extend_from_slice(&module[i..]);
    Ok(out)
}

/// Complete header text for `info`, without the `$FF $FF` terminator.
#[must_use]
pub fn header_for(info: &ModuleInfo) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    start_header(&mut out, info).ok()?;
    out.extend_from_slice(format!("TYPE {}\r\n", info.module_type.letter()).as_bytes());
    if info.fastplay != DEFAULT_FASTPLAY {
        put_dec_tag(&mut out, "FASTPLAY", info.fastplay as usize);
    }
    for (tag, value) in [("MUSIC", info.music), ("INIT", info.init), ("PLAYER", info.player)] {
        if let Some(addr) = value {
            out.extend_from_slice(format!("{tag} {addr:04X}\r\n").as_bytes());
        }
    }
    if let Some(addr) = info.covox_addr {
        out.extend_from_slice(format!("COVOX {addr:04X}\r\n").as_bytes());
    }
    put_durations(&mut out, info);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sap(header: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = header.replace('\n', "\r\n").into_bytes();
        bytes.extend_from_slice(&[0xFF, 0xFF]);
        bytes.extend_from_slice(body);
        bytes
    }

    const BODY: [u8; 7] = [0x00, 0x10, 0x02, 0x10, 0x60, 0x60, 0x60];

    #[test]
    fn parses_tags() {
        let module = sap(
            "SAP\nAUTHOR \"Jakub Husak\"\nNAME \"Jet Boy\"\nDATE \"1990\"\nSONGS 3\nDEFSONG 1\n\
             TYPE B\nINIT 1000\nPLAYER 1003\nTIME 02:30.5\nTIME 0:05 LOOP\n",
            &BODY,
        );
        let info = module_info("jet_boy.sap", &module).unwrap();
        assert_eq!(info.author, "Jakub Husak");
        assert_eq!(info.name, "Jet Boy");
        assert_eq!(info.date, "1990");
        assert_eq!(info.songs, 3);
        assert_eq!(info.default_song, 1);
        assert_eq!(info.module_type, ModuleType::SapB);
        assert_eq!(info.init, Some(0x1000));
        assert_eq!(info.player, Some(0x1003));
        assert_eq!(info.duration(0), Some(150_500));
        assert_eq!(info.duration(1), Some(5_000));
        assert_eq!(info.duration(2), None);
        assert!(!info.is_loop(0));
        assert!(info.is_loop(1));
    }

    #[test]
    fn unknown_text_keeps_defaults() {
        let module = sap(
            "SAP\nAUTHOR \"<?>\"\nNAME \"<?>\"\nTYPE B\nINIT 1000\nPLAYER 1003\n",
            &BODY,
        );
        let info = module_info("dir/Tune.SAP", &module).unwrap();
        assert_eq!(info.author, "");
        assert_eq!(info.name, "Tune");
    }

    #[test]
    fn type_requirements() {
        let missing_player = sap("SAP\nTYPE B\nINIT 1000\n", &BODY);
        assert!(matches!(
            module_info("a.sap", &missing_player),
            Err(AsapError::InvalidHeader(_))
        ));
        let type_s = sap("SAP\nTYPE S\nINIT 1000\nFASTPLAY 156\n", &BODY);
        assert_eq!(module_info("a.sap", &type_s).unwrap().fastplay, 78);
        let type_c = sap("SAP\nTYPE C\nPLAYER 500\nMUSIC 2000\n", &BODY);
        assert_eq!(module_info("a.sap", &type_c).unwrap().module_type, ModuleType::SapC);
    }

    #[test]
    fn rejects_bad_headers() {
        let cases = [
            "NAME \"x\"\nSAP\nTYPE B\nINIT 1000\nPLAYER 1003\n",
            "SAP\nTYPE B\nINIT 10000\nPLAYER 1003\n",
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nSONGS 33\n",
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nSONGS 2\nDEFSONG 2\n",
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nFASTPLAY 0\n",
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nCOVOX D700\n",
            "SAP\nTYPE X\nINIT 1000\nPLAYER 1003\n",
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nAUTHOR unquoted\n",
        ];
        for header in cases {
            assert!(module_info("a.sap", &sap(header, &BODY)).is_err(), "{header:?}");
        }
        let bad_time = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nTIME soon\n", &BODY);
        assert!(matches!(
            module_info("a.sap", &bad_time),
            Err(AsapError::InvalidDuration(_))
        ));
    }

    #[test]
    fn rejects_lf_only_lines() {
        let mut module = b"SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n".to_vec();
        module.extend_from_slice(&[0xFF, 0xFF]);
        module.extend_from_slice(&BODY);
        assert!(module_info("a.sap", &module).is_err());
    }

    #[test]
    fn covox_implies_stereo() {
        let module = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\nCOVOX D600\n", &BODY);
        let info = module_info("a.sap", &module).unwrap();
        assert_eq!(info.covox_addr, Some(0xD600));
        assert_eq!(info.channels, 2);
    }

    #[test]
    fn unsupported_extension() {
        let module = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n", &BODY);
        assert!(matches!(
            module_info("a.rmt", &module),
            Err(AsapError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            module_info("noext", &module),
            Err(AsapError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn loads_blocks() {
        let mut body = vec![0x00, 0x10, 0x02, 0x10, 0xA9, 0x01, 0x60];
        body.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x20, 0x00, 0x20, 0x42]);
        body.extend_from_slice(&[0x00, 0x30, 0x01, 0x30, 0x11, 0x22]);
        let module = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n", &body);
        let info = module_info("a.sap", &module).unwrap();

        let mut memory = vec![0xEE; 0x10000];
        load_blocks(&mut memory, &module, info.header_len).unwrap();
        assert_eq!(&memory[0x1000..0x1003], &[0xA9, 0x01, 0x60]);
        assert_eq!(memory[0x2000], 0x42);
        assert_eq!(&memory[0x3000..0x3002], &[0x11, 0x22]);
        assert_eq!(memory[0x0000], 0, "memory is cleared first");
    }

    #[test]
    fn rejects_truncated_blocks() {
        let module = sap(
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n",
            &[0x00, 0x10, 0x05, 0x10, 0x60, 0x60, 0x60],
        );
        let info = module_info("a.sap", &module).unwrap();
        let mut memory = vec![0; 0x10000];
        assert!(matches!(
            load_blocks(&mut memory, &module, info.header_len),
            Err(AsapError::InvalidBlock { .. })
        ));

        let reversed = sap(
            "SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n",
            &[0x02, 0x10, 0x00, 0x10, 0x60, 0x60, 0x60],
        );
        assert!(load_blocks(&mut memory, &reversed, info.header_len).is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut body = BODY.to_vec();
        body.extend_from_slice(&[0x01, 0x02]);
        let module = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n", &body);
        let info = module_info("a.sap", &module).unwrap();
        let mut memory = vec![0; 0x10000];
        assert!(load_blocks(&mut memory, &module, info.header_len).is_err());
    }

    #[test]
    fn rewrites_metadata() {
        let module = sap(
            "SAP\nAUTHOR \"Old\"\nNAME \"Old Name\"\nTYPE B\nINIT 1000\nPLAYER 1003\nTIME 1:00\n",
            &BODY,
        );
        let mut info = module_info("a.sap", &module).unwrap();
        info.author = "New Author".to_string();
        info.songs = 2;
        info.durations[0] = Some(61_500);
        info.durations[1] = Some(2_000);
        info.loops[1] = true;

        let rewritten = set_module_info(&info, &module).unwrap();
        let text_end = rewritten.iter().position(|&b| b == 0xFF).unwrap();
        let text = std::str::from_utf8(&rewritten[..text_end]).unwrap();
        assert_eq!(
            text,
            "SAP\r\nAUTHOR \"New Author\"\r\nNAME \"Old Name\"\r\nDATE \"<?>\"\r\nSONGS 2\r\n\
             TYPE B\r\nINIT 1000\r\nPLAYER 1003\r\nTIME 01:01.50\r\nTIME 00:02 LOOP\r\n"
        );
        assert!(rewritten.ends_with(&BODY));

        let reparsed = module_info("a.sap", &rewritten).unwrap();
        assert_eq!(reparsed.author, "New Author");
        assert_eq!(reparsed.songs, 2);
        assert_eq!(reparsed.duration(0), Some(61_500));
        assert!(reparsed.is_loop(1));
    }

    #[test]
    fn rewrite_rejects_quotes_in_text() {
        let module = sap("SAP\nTYPE B\nINIT 1000\nPLAYER 1003\n", &BODY);
        let mut info = module_info("a.sap", &module).unwrap();
        info.name = "say \"hi\"".to_string();
        assert!(set_module_info(&info, &module).is_err());
        assert!(set_module_info(&info, b"NOTSAP").is_err());
    }

    #[test]
    fn generated_header_parses_back() {
        let mut info = ModuleInfo::new("gen");
        info.init = Some(0x1000);
        info.player = Some(0x1003);
        info.fastplay = 156;
        info.durations[0] = Some(3_000);
        let mut module = header_for(&info).unwrap();
        module.extend_from_slice(&[0xFF, 0xFF]);
        module.extend_from_slice(&BODY);

        let parsed = module_info("gen.sap", &module).unwrap();
        assert_eq!(parsed.fastplay, 156);
        assert_eq!(parsed.init, Some(0x1000));
        assert_eq!(parsed.player, Some(0x1003));
        assert_eq!(parsed.duration(0), Some(3_000));
        assert_eq!(parsed.name, "gen");
    }
}
