//! Drive the cached client stack against a running proxy and print results.
//! Usage:
//!   cargo run --bin cinehub_browse -- trending [pages]
//!   cargo run --bin cinehub_browse -- search <query> [pages]
//!   cargo run --bin cinehub_browse -- genre <genre_id> [pages]
//!   cargo run --bin cinehub_browse -- genres
//!   cargo run --bin cinehub_browse -- movie <tmdb_id>
//!   cargo run --bin cinehub_browse -- person <tmdb_id>
//!   cargo run --bin cinehub_browse -- watchlist
//!   cargo run --bin cinehub_browse -- watch <tmdb_id>
//!   cargo run --bin cinehub_browse -- unwatch <tmdb_id>
//! Reads CINEHUB_API_BASE (defaults to the local proxy) and .env.

use anyhow::{anyhow, Context, Result};
use cinehub::browse::{self, HomeFilter, KNOWN_FOR_LIMIT};
use cinehub::cache::QueryState;
use cinehub::config;
use cinehub::image::{image_url, ImageSize};
use cinehub::models::Movie;
use cinehub::queries::{MovieList, MovieQueries};
use cinehub::tmdb::{TmdbApi, TmdbClient};
use cinehub::watchlist::{FileStore, TracingNotifier, Watchlist};
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("trending");
    let api: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let queries = MovieQueries::new(api);

    match command {
        "trending" => show_feed(&queries, &HomeFilter::default(), page_arg(&args, 1)?).await,
        "search" => {
            let query = args.get(1).context("search needs a query")?;
            let mut filter = HomeFilter::default();
            filter.set_query(query);
            show_feed(&queries, &filter, page_arg(&args, 2)?).await
        }
        "genre" => {
            let mut filter = HomeFilter::default();
            filter.toggle_genre(id_arg(&args)?);
            show_feed(&queries, &filter, page_arg(&args, 2)?).await
        }
        "genres" => {
            let state = queries.genres().await;
            if let Some(list) = settled(&state) {
                for g in &list.genres {
                    println!("{:>6}  {}", g.id, g.name);
                }
            }
            Ok(())
        }
        "movie" => show_movie(&queries, id_arg(&args)?).await,
        "person" => show_person(&queries, id_arg(&args)?).await,
        "watchlist" => {
            let list = open_watchlist()?;
            if list.is_empty() {
                println!("Your watchlist is empty.");
            }
            for movie in list.list() {
                print_movie(movie);
            }
            Ok(())
        }
        "watch" => {
            let id = id_arg(&args)?;
            let state = queries.movie_details(id).await;
            let Some(detail) = settled(&state) else {
                return Ok(());
            };
            let mut list = open_watchlist()?;
            if !list.add(Movie::from(detail.clone())) {
                println!("\"{}\" is already on your watchlist.", detail.title);
            }
            Ok(())
        }
        "unwatch" => {
            let id = id_arg(&args)?;
            let mut list = open_watchlist()?;
            if !list.remove(id) {
                println!("Movie {} is not on your watchlist.", id);
            }
            Ok(())
        }
        other => Err(anyhow!("unknown command '{}'", other)),
    }
}

fn open_watchlist() -> Result<Watchlist> {
    let store = FileStore::new(config::watchlist_dir()?);
    Ok(Watchlist::load(Arc::new(store), Arc::new(TracingNotifier)))
}

fn id_arg(args: &[String]) -> Result<i32> {
    args.get(1)
        .context("missing id argument")?
        .parse()
        .context("id must be a number")
}

fn page_arg(args: &[String], index: usize) -> Result<usize> {
    match args.get(index) {
        Some(v) => v.parse().context("page count must be a number"),
        None => Ok(1),
    }
}

/// Data of a settled query, printing the inline error when it failed.
fn settled<V>(state: &QueryState<V>) -> Option<&V> {
    if let Some(err) = &state.error {
        println!("{}", err.user_message());
    }
    state.data()
}

async fn show_feed(queries: &MovieQueries, filter: &HomeFilter, pages: usize) -> Result<()> {
    let mut state: MovieList = queries.home_feed(filter).await;
    while state.data.as_ref().map(|d| d.page_count()).unwrap_or(0) < pages && state.has_next_page() {
        state = queries.home_feed_next_page(filter).await;
        if state.error.is_some() {
            break;
        }
    }
    let genres = queries.genres().await;
    for movie in state.items() {
        print_movie(movie);
        if let Some(catalog) = genres.data() {
            let names = browse::genre_names(movie, catalog, 2);
            if !names.is_empty() {
                println!("        {}", names);
            }
        }
    }
    settled(&state);
    if state.has_next_page() {
        println!("(more available)");
    }
    Ok(())
}

async fn show_movie(queries: &MovieQueries, id: i32) -> Result<()> {
    let (detail, credits, videos, recs) = tokio::join!(
        queries.movie_details(id),
        queries.movie_credits(id),
        queries.movie_videos(id),
        queries.movie_recommendations(id),
    );
    let Some(movie) = settled(&detail) else {
        return Ok(());
    };
    println!("{} ({})", movie.title, movie.year().unwrap_or("n/a"));
    if !movie.tagline.is_empty() {
        println!("  \"{}\"", movie.tagline);
    }
    let genres: Vec<&str> = movie.genres.iter().map(|g| g.name.as_str()).collect();
    println!("  {}", genres.join(", "));
    if let Some(runtime) = browse::format_runtime(movie.runtime) {
        println!("  {}", runtime);
    }
    println!("  {:.1}/10 ({} votes)", movie.vote_average, movie.vote_count);
    println!("  {}", image_url(movie.poster_path.as_deref(), ImageSize::W500));
    println!("\n{}\n", movie.overview);
    if let Some(trailer) = videos.data().and_then(|v| browse::pick_trailer(&v.results)) {
        if let Some(url) = trailer.youtube_embed_url() {
            println!("Trailer: {}", url);
        }
    }
    if let Some(credits) = credits.data() {
        println!("Cast:");
        for actor in credits.cast.iter().take(6) {
            println!("  {} as {}", actor.name, actor.character);
        }
    }
    if let Some(recs) = recs.data() {
        println!("You might also like:");
        for rec in recs.results.iter().take(5) {
            print_movie(rec);
        }
    }
    Ok(())
}

async fn show_person(queries: &MovieQueries, id: i32) -> Result<()> {
    let order = config::known_for_order()?;
    let (person, credits) = tokio::join!(
        queries.person_details(id),
        queries.person_movie_credits(id),
    );
    let Some(person) = settled(&person) else {
        return Ok(());
    };
    println!("{}", person.name);
    if let Some(born) = &person.birthday {
        println!("  Born: {}", born);
    }
    if let Some(place) = &person.place_of_birth {
        println!("  {}", place);
    }
    println!("  {}", image_url(person.profile_path.as_deref(), ImageSize::H632));
    if person.biography.is_empty() {
        println!("\nNo biography available.\n");
    } else {
        println!("\n{}\n", person.biography);
    }
    if let Some(credits) = credits.data() {
        let known = browse::known_for(credits, order, KNOWN_FOR_LIMIT);
        if !known.is_empty() {
            println!("Known For:");
            for movie in known {
                print_movie(movie);
            }
        }
    }
    Ok(())
}

fn print_movie(movie: &Movie) {
    println!(
        "{:>8}  {:<40} {:>4}  {:.1}",
        movie.id,
        movie.title,
        movie.year().unwrap_or(""),
        movie.vote_average
    );
}
