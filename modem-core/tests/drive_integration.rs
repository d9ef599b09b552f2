//! Integration tests for mounting virtual drives and serving blocks over the
//! modem's transport.

use modem_core::drive::protocol::{checksum, HEADER_LEN, RESPONSE_LEN};
use modem_core::{
    HeadlessTransport, ManualClock, MemoryFlash, MemoryNetwork, MemoryRemoteFs, Modem,
    Peripherals, Transport,
};

/// 2024-03-15 13:45:00 UTC
const EPOCH: i64 = 1_710_510_300;

fn modem(fs: &MemoryRemoteFs) -> Modem<HeadlessTransport> {
    let peripherals = Peripherals {
        network: Box::new(MemoryNetwork::new()),
        flash: Box::new(MemoryFlash::default()),
        remote: Box::new(fs.clone()),
        clock: Box::new(ManualClock::at_epoch(EPOCH)),
    };
    let mut modem = Modem::new(HeadlessTransport::new(), peripherals);
    modem.transport_mut().queue_str("ATE0\r");
    drain(&mut modem);
    modem.transport_mut().clear_output();
    modem
}

fn drain(modem: &mut Modem<HeadlessTransport>) {
    while modem.transport_mut().available() > 0 {
        modem.poll();
    }
}

fn command(modem: &mut Modem<HeadlessTransport>, line: &str) -> String {
    modem.transport_mut().queue_str(&format!("{}\r", line));
    drain(modem);
    modem.transport_mut().take_output()
}

fn frame(ctrl: u8, block: u16) -> Vec<u8> {
    let [lo, hi] = block.to_le_bytes();
    vec![0xC5, ctrl, lo, hi, 0xC5 ^ ctrl ^ lo ^ hi]
}

/// Run one drive service session over `requests`, followed by a terminate
/// frame, and return what was written back.
fn serve(modem: &mut Modem<HeadlessTransport>, requests: &[u8]) -> Vec<u8> {
    let mut input = b"ATVSO\r".to_vec();
    input.extend_from_slice(requests);
    input.extend_from_slice(&frame(0x80, 0));
    modem.transport_mut().queue_input(&input);
    drain(modem);
    let out = modem.transport().output().to_vec();
    modem.transport_mut().clear_output();
    // Dispatch writes a line break before the service starts.
    out[2..].to_vec()
}

fn image(blocks: usize) -> Vec<u8> {
    (0..blocks * 512).map(|i| (i / 512) as u8 ^ (i % 251) as u8).collect()
}

#[test]
fn test_mount_and_read_block() {
    let fs = MemoryRemoteFs::new();
    let disk = image(4);
    fs.add_file("smb://nas/apple/total.po", disk.clone());
    let mut modem = modem(&fs);

    assert_eq!(
        command(&mut modem, "ATVS1smb://nas/apple/total.po"),
        "\r\n\r\nOK\r\n"
    );
    assert!(modem.drives().is_mounted(0));

    let out = serve(&mut modem, &frame(0x03, 2));
    assert_eq!(out.len(), RESPONSE_LEN);
    assert_eq!(&out[..4], &[0xC5, 0x03, 0x02, 0x00]);
    assert_eq!(&out[4..6], &((13u16 << 8) | 45).to_le_bytes());
    assert_eq!(&out[6..8], &((24u16 << 9) | (3 << 5) | 15).to_le_bytes());
    assert_eq!(out[8], checksum(&out[..8]));
    assert_eq!(&out[HEADER_LEN..HEADER_LEN + 512], &disk[1024..1536]);
    assert_eq!(out[RESPONSE_LEN - 1], checksum(&disk[1024..1536]));

    // Line rate raised for the session and restored after.
    assert_eq!(modem.transport().baud_changes(), &[115200, 19200]);
}

#[test]
fn test_spec_example_frame_accepted() {
    let fs = MemoryRemoteFs::new();
    fs.add_file("disk.po", image(1));
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS1disk.po");

    let out = serve(&mut modem, &[0xC5, 0x03, 0x00, 0x00, 0xC6]);
    assert_eq!(out.len(), RESPONSE_LEN);
}

#[test]
fn test_corrupted_frames_dropped() {
    let fs = MemoryRemoteFs::new();
    fs.add_file("disk.po", image(1));
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS1disk.po");

    let good = [0xC5u8, 0x03, 0x00, 0x00, 0xC6];
    for i in 1..4 {
        let mut bad = good;
        bad[i] ^= 0x01;
        assert!(serve(&mut modem, &bad).is_empty(), "byte {} not checked", i);
    }
    let mut bad = good;
    bad[4] = 0x00;
    assert!(serve(&mut modem, &bad).is_empty());
}

#[test]
fn test_short_read_bumps_checksum() {
    let fs = MemoryRemoteFs::new();
    let mut disk = image(1);
    disk.truncate(500);
    fs.add_file("short.po", disk.clone());
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS2short.po");

    let out = serve(&mut modem, &frame(0x05, 0));
    assert_eq!(out.len(), RESPONSE_LEN);
    let data = &out[HEADER_LEN..HEADER_LEN + 512];
    assert_eq!(&data[..500], &disk[..]);
    assert_eq!(out[RESPONSE_LEN - 1], checksum(data).wrapping_add(1));
}

#[test]
fn test_2img_header_skipped() {
    let fs = MemoryRemoteFs::new();
    let disk = image(2);
    let mut file = vec![0u8; 64];
    file[..4].copy_from_slice(b"2IMG");
    file[0x18] = 64;
    file.extend_from_slice(&disk);
    fs.add_file("game.2mg", file);
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS1game.2mg");

    let out = serve(&mut modem, &frame(0x03, 1));
    assert_eq!(&out[HEADER_LEN..HEADER_LEN + 512], &disk[512..1024]);
}

#[test]
fn test_unmounted_drive_and_writes_are_silent() {
    let fs = MemoryRemoteFs::new();
    let mut modem = modem(&fs);
    let mut requests = frame(0x03, 0);
    requests.extend_from_slice(&frame(0x05, 0));
    requests.extend_from_slice(&frame(0x02, 0));
    assert!(serve(&mut modem, &requests).is_empty());
}

#[test]
fn test_failed_mount_errors_and_clears_slot() {
    let fs = MemoryRemoteFs::new();
    fs.add_file("disk.po", image(1));
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS1disk.po");
    assert_eq!(fs.opens(), 1);
    assert_eq!(command(&mut modem, "ATVS1missing.po"), "\r\n\r\nERROR\r\n");
    assert_eq!(fs.opens(), 1);
    assert!(!modem.drives().is_mounted(0));
    assert_eq!(fs.open_handles(), 0);
    assert_eq!(command(&mut modem, "ATVS3disk.po"), "\r\n\r\nERROR\r\n");
}

#[test]
fn test_remount_replaces_image() {
    let fs = MemoryRemoteFs::new();
    fs.add_file("a.po", vec![0xAA; 512]);
    fs.add_file("b.po", vec![0xBB; 512]);
    let mut modem = modem(&fs);
    command(&mut modem, "ATVS1a.po");
    assert_eq!(command(&mut modem, "ATVS1b.po"), "\r\n\r\nOK\r\n");
    assert_eq!(fs.opens(), 2);
    assert_eq!(fs.open_handles(), 1);

    let out = serve(&mut modem, &frame(0x03, 0));
    assert_eq!(&out[HEADER_LEN..HEADER_LEN + 512], &[0xBB; 512][..]);
}

#[test]
fn test_commands_resume_after_service() {
    let fs = MemoryRemoteFs::new();
    let mut modem = modem(&fs);
    serve(&mut modem, &[]);
    assert_eq!(command(&mut modem, "AT"), "\r\n\r\nOK\r\n");
}
