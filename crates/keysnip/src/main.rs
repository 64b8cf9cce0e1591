fn main() {
    keysnip_cli::run_main();
}
