use clap::{arg,crate_version,Command};
use bitseek::{BitReader,Stream,Whence,DYNERR,STDRESULT};
use std::io::{Cursor,Read,Seek};

const RCH: &str = "unreachable was reached";

/// parse comma separated bit widths such as `3,3,2`
fn parse_widths(s: &str) -> Result<Vec<u32>,bitseek::Error> {
    let mut ans = Vec::new();
    for w in s.split(',').map(|w| w.trim()).filter(|w| !w.is_empty()) {
        match w.parse::<u32>() {
            Ok(n) => ans.push(n),
            Err(_) => return Err(bitseek::Error::InvalidArgument(format!("bad width `{}`",w)))
        }
    }
    Ok(ans)
}

/// get the source bytes, either from the file or from the hex string
fn load(cmd: &clap::ArgMatches) -> Result<Vec<u8>,DYNERR> {
    if let Some(hex_str) = cmd.get_one::<String>("hex") {
        let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();
        return Ok(hex::decode(cleaned)?);
    }
    let path_in = cmd.get_one::<String>("input").expect(RCH);
    let mut buf = Vec::new();
    std::fs::File::open(path_in)?.read_to_end(&mut buf)?;
    Ok(buf)
}

/// seek if an offset was given, returns the offset where reading starts
fn position<R: Read + Seek>(br: &mut BitReader<R>,cmd: &clap::ArgMatches) -> Result<u64,bitseek::Error> {
    match cmd.get_one::<i64>("seek") {
        Some(offset) => {
            let whence = cmd.get_one::<String>("whence").expect(RCH).parse::<Whence>()?;
            br.seek(*offset,whence)
        },
        None => br.position()
    }
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Read fields:   `bitseek fields -w 3,3,2 -x FF`
After a seek:  `bitseek fields -w 12 -s 4 -i my_file.bin`
Show bits:     `bitseek dump -n 20 -s -20 --whence end -i my_file.bin`";

    let whence_names = ["start","current","end"];

    let mut main_cmd = Command::new("bitseek")
        .about("Read un-aligned bit fields from binary data")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("fields")
        .arg(arg!(-w --widths <LIST> "comma separated field widths in bits").required(true))
        .arg(arg!(-i --input <PATH> "input path").required_unless_present("hex"))
        .arg(arg!(-x --hex <HEX> "input as hex string").conflicts_with("input"))
        .arg(arg!(-s --seek <BITS> "bit offset to start from").value_parser(clap::value_parser!(i64))
            .allow_negative_numbers(true))
        .arg(arg!(--whence <WHENCE> "reference point for the offset").value_parser(whence_names)
            .default_value("start"))
        .arg(arg!(-b --binary "show fields as binary"))
        .about("read a sequence of bit fields"));

    main_cmd = main_cmd.subcommand(Command::new("dump")
        .arg(arg!(-i --input <PATH> "input path").required_unless_present("hex"))
        .arg(arg!(-x --hex <HEX> "input as hex string").conflicts_with("input"))
        .arg(arg!(-s --seek <BITS> "bit offset to start from").value_parser(clap::value_parser!(i64))
            .allow_negative_numbers(true))
        .arg(arg!(--whence <WHENCE> "reference point for the offset").value_parser(whence_names)
            .default_value("start"))
        .arg(arg!(-n --count <BITS> "number of bits to show").value_parser(clap::value_parser!(u64)))
        .about("show the bits as binary"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("fields") {
        let widths = parse_widths(cmd.get_one::<String>("widths").expect(RCH))?;
        let binary = cmd.get_flag("binary");
        let mut br = BitReader::new(Cursor::new(load(cmd)?));
        let start = position(&mut br,cmd)?;
        log::info!("reading {} fields from bit {}",widths.len(),start);
        let fields = match br.read_fields(&widths) {
            Ok(fields) => fields,
            Err(e) => {
                eprintln!("read {} of {} fields",e.fields.len(),widths.len());
                return Err(Box::new(e));
            }
        };
        for (n,val) in widths.iter().zip(fields.iter()) {
            match binary {
                true => println!("{}",Stream::from_value(*val,*n)?),
                false => println!("{:#x}",val)
            }
        }
    }

    if let Some(cmd) = matches.subcommand_matches("dump") {
        let mut br = BitReader::new(Cursor::new(load(cmd)?));
        let start = position(&mut br,cmd)?;
        let end = br.seek(0,Whence::End)?;
        br.seek(start as i64,Whence::Start)?;
        let mut remaining = match cmd.get_one::<u64>("count") {
            Some(count) => *count,
            None => end.saturating_sub(start)
        };
        log::info!("dumping {} bits from {}",remaining,start);
        let mut bits = Stream::new();
        while remaining > 0 {
            let n = remaining.min(64) as u32;
            bits.push_value(br.read(n)?,n)?;
            remaining -= n as u64;
        }
        println!("{}",bits);
    }

    Ok(())
}
