use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use reqwest::Client;
use tokio::{
    io::{BufReader, Stdout},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    ai::{
        client::CredentialProvider, ClassificationService, Classifier, FallbackClassifier,
        HuggingFaceClient, LexiconLoader, LocalClassifier, PatternClassifier, SwappableClassifier,
    },
    config::{AppConfig, BackendKind, RemoteConfig},
    domain::CandidateLabelSet,
    host::{spawn_command_reader, BackendSwitch, CommandHandler, JsonLinesRenderer},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    scanner::{channel_feed, ChannelFeed, FeedScanner, ScannerOptions, ScannerTask},
    settings::{JsonFileSettingsStore, SettingsPatch, SettingsStore},
    tasks::{
        scheduler::{configure_rescan_job, RescanCallback},
        RequestSerializer,
    },
};

pub struct FeedGuardApp {
    _paths: ResolvedPaths,
    scheduler: JobScheduler,
    serializer: Arc<RequestSerializer>,
    serializer_handle: JoinHandle<()>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<Stdout>,
    scanner: ScannerTask,
    feed: ChannelFeed,
    rescans: mpsc::UnboundedReceiver<()>,
    settings: Arc<dyn SettingsStore>,
    shutdown: Shutdown,
}

impl FeedGuardApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let settings: Arc<dyn SettingsStore> =
            Arc::new(JsonFileSettingsStore::open(paths.settings_path.clone())?);
        if settings.get().api_token.is_none() {
            if let Some(token) = &config.classifier.api_token {
                settings.update(SettingsPatch {
                    api_token: Some(token.clone()),
                    ..SettingsPatch::default()
                })?;
            }
        }

        let labels = match &config.labels_file {
            Some(path) => CandidateLabelSet::from_file(path)
                .with_context(|| format!("failed to load labels from {}", path.display()))?,
            None => CandidateLabelSet::default(),
        };
        let labels = Arc::new(labels);
        tracing::info!(
            target: "classifier",
            labels = labels.len(),
            blur_labels = labels.blur_labels().count(),
            "candidate labels loaded"
        );

        let http_client = Client::builder()
            .user_agent(format!("feed-guard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let credentials: CredentialProvider = {
            let settings = settings.clone();
            Arc::new(move || settings.get().api_token)
        };
        let backends = Arc::new(BackendFactory {
            http: http_client,
            remote: config.classifier.remote.clone(),
            credentials,
            labels: labels.clone(),
            fallback: config.classifier.fallback,
            local: Mutex::new(None),
        });
        let classifier = Arc::new(SwappableClassifier::new(
            backends.build(config.classifier.backend),
        ));

        let service = ClassificationService::new(classifier.clone(), labels);
        let (serializer, serializer_handle) =
            RequestSerializer::start(service, config.queue.spacing, shutdown.subscribe());

        let (renderer, writer_handle) = JsonLinesRenderer::spawn(tokio::io::stdout());
        let (scanner, completions) = FeedScanner::new(
            settings.clone(),
            serializer.clone(),
            Arc::new(renderer),
            ScannerOptions::from_config(&config.scanner),
        );
        let scanner = ScannerTask::new(scanner, completions, &config.scanner);

        let (publisher, feed) = channel_feed();
        let handler = CommandHandler::new(
            publisher,
            settings.clone(),
            build_backend_switch(backends, classifier),
        );
        let reader_handle = spawn_command_reader(
            BufReader::new(tokio::io::stdin()),
            handler,
            shutdown.subscribe(),
        );

        let (rescan_tx, rescans) = mpsc::unbounded_channel();
        let rescan: RescanCallback = Arc::new(move || {
            let _ = rescan_tx.send(());
        });
        let scheduler = configure_rescan_job(config.scanner.rescan_interval, rescan).await?;

        Ok(Self {
            _paths: paths,
            scheduler,
            serializer,
            serializer_handle,
            reader_handle,
            writer_handle,
            scanner,
            feed,
            rescans,
            settings,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FeedGuardApp {
            _paths: _,
            mut scheduler,
            serializer,
            mut serializer_handle,
            mut reader_handle,
            mut writer_handle,
            scanner,
            feed,
            rescans,
            settings,
            shutdown,
        } = self;

        tracing::info!(target: "host", "feed guard started");

        let mut shutdown_listener = shutdown.subscribe();
        let shutdown_timeout = Duration::from_secs(5);
        let mut scanner_handle = tokio::spawn(scanner.run(
            feed,
            settings.subscribe(),
            rescans,
            shutdown.subscribe(),
        ));
        let mut scanner_completed = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "host", "shutdown signal received");
            }
            res = &mut scanner_handle => {
                scanner_completed = true;
                match res {
                    Ok(scanner) => tracing::info!(
                        target: "scanner",
                        tracked = scanner.table().len(),
                        "scanner finished"
                    ),
                    Err(err) => tracing::error!(target: "scanner", ?err, "scanner task failed"),
                }
            }
        }

        shutdown.trigger();

        match timeout(shutdown_timeout, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "scheduler", ?err, "failed to stop scheduler");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    shutdown_timeout
                );
            }
        }

        let scanner_stop = async {
            if !scanner_completed {
                stop_task("scanner", &mut scanner_handle, shutdown_timeout).await;
            }
        };
        futures::future::join3(
            scanner_stop,
            stop_task("host", &mut reader_handle, shutdown_timeout),
            stop_task("queue", &mut serializer_handle, shutdown_timeout),
        )
        .await;
        // The scanner owned the only renderer; its backlog drains now.
        stop_task("renderer", &mut writer_handle, shutdown_timeout).await;

        let snapshot = serializer.snapshot();
        tracing::info!(
            target: "host",
            served = snapshot.served,
            dropped = snapshot.depth,
            "feed guard stopped"
        );
        Ok(())
    }
}

async fn stop_task<T>(name: &'static str, handle: &mut JoinHandle<T>, limit: Duration) {
    let wait = tokio::time::sleep(limit);
    tokio::pin!(wait);
    tokio::select! {
        res = &mut *handle => {
            if let Err(err) = res {
                if err.is_panic() {
                    tracing::error!(target: "host", task = name, "task panicked");
                }
            }
        }
        _ = &mut wait => {
            tracing::warn!(
                target: "host",
                task = name,
                "task did not stop within {:?}; aborting",
                limit
            );
            handle.abort();
        }
    }
}

struct BackendFactory {
    http: Client,
    remote: RemoteConfig,
    credentials: CredentialProvider,
    labels: Arc<CandidateLabelSet>,
    fallback: bool,
    local: Mutex<Option<LocalClassifier>>,
}

impl BackendFactory {
    fn build(&self, kind: BackendKind) -> Arc<dyn Classifier> {
        let primary: Arc<dyn Classifier> = match kind {
            BackendKind::Remote => Arc::new(HuggingFaceClient::new(
                self.http.clone(),
                self.remote.clone(),
                self.credentials.clone(),
            )),
            BackendKind::Local => Arc::new(
                self.local
                    .lock()
                    .get_or_insert_with(|| {
                        LocalClassifier::spawn(Arc::new(LexiconLoader), self.labels.clone())
                    })
                    .clone(),
            ),
        };
        if self.fallback {
            Arc::new(FallbackClassifier::new(primary, Arc::new(PatternClassifier)))
        } else {
            primary
        }
    }
}

fn build_backend_switch(
    backends: Arc<BackendFactory>,
    classifier: Arc<SwappableClassifier>,
) -> BackendSwitch {
    Arc::new(move |kind| {
        tracing::info!(target: "classifier", ?kind, "switching classifier backend");
        classifier.swap(backends.build(kind));
    })
}
