use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Write the bytes to a file in a temporary directory, return the path.
fn temp_input(temp_dir: &tempfile::TempDir,bytes: &[u8]) -> Result<std::path::PathBuf,Box<dyn std::error::Error>> {
    let path = temp_dir.path().join("input.bin");
    std::fs::write(&path,bytes)?;
    Ok(path)
}

#[test]
fn fields_from_hex() -> STDRESULT {
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("3,3,2")
        .arg("-x").arg("FF")
        .assert()
        .success()
        .stdout("0x7\n0x7\n0x3\n");
    Ok(())
}

#[test]
fn fields_from_file() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_input(&temp_dir,&[0xAA,0x55,0xAA,0x55,0xAA,0x55,0xAA,0x55])?;
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("33,31")
        .arg("-i").arg(&in_path)
        .assert()
        .success()
        .stdout("0x154ab54ab\n0x2a55aa55\n");
    Ok(())
}

#[test]
fn fields_after_seek() -> STDRESULT {
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("8")
        .arg("-s").arg("4")
        .arg("-b")
        .arg("-x").arg("AA55")
        .assert()
        .success()
        .stdout("10100101\n");
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("3")
        .arg("-s").arg("-3")
        .arg("--whence").arg("end")
        .arg("-x").arg("AA55")
        .assert()
        .success()
        .stdout("0x5\n");
    Ok(())
}

#[test]
fn truncated_fields_fail() -> STDRESULT {
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("33")
        .arg("-x").arg("EDD37EB6")
        .assert()
        .failure()
        .stderr(predicate::str::contains("UnexpectedEndOfStream"));
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("1,8")
        .arg("-x").arg("FF")
        .assert()
        .failure()
        .stderr(predicate::str::contains("read 1 of 2 fields"));
    Ok(())
}

#[test]
fn seek_out_of_range_fails() -> STDRESULT {
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("fields")
        .arg("-w").arg("1")
        .arg("-s").arg("19")
        .arg("-x").arg("AA55")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OffsetOutOfRange"));
    Ok(())
}

#[test]
fn dump_bits() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_input(&temp_dir,&[0xAA,0x55])?;
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("dump")
        .arg("-i").arg(&in_path)
        .assert()
        .success()
        .stdout("10101010 01010101\n");
    let mut cmd = Command::cargo_bin("bitseek")?;
    cmd.arg("dump")
        .arg("-s").arg("3")
        .arg("-n").arg("10")
        .arg("-i").arg(&in_path)
        .assert()
        .success()
        .stdout("01010010 10\n");
    Ok(())
}
