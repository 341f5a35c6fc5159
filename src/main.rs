fn main() {
    if let Err(err) = survey_cleanse::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
