fn main() -> std::process::ExitCode {
    podtrim_lib::run()
}
